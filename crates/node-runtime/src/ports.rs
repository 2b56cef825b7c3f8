//! # Consensus Engine Boundary
//!
//! The runtime hands durably stored events to the consensus engine one at a
//! time through [`ConsensusSink`]; the engine answers later through the
//! intake's `on_consensus_reached` / `on_stale` callbacks. The sink is a
//! port so tests and engine-less deployments can substitute their own.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use shared_types::{short_hex, AdmittedEvent};
use tracing::trace;

/// Receives ordered-candidate events after their durable write.
#[async_trait]
pub trait ConsensusSink: Send + Sync {
    /// Accepts one event. Called in durable-log order, never concurrently.
    async fn deliver(&self, event: AdmittedEvent);
}

/// Stand-in sink for a node without an attached consensus engine.
///
/// Counts deliveries and logs them at trace level. The count makes the
/// binary's smoke path observable and keeps tests out of log parsing.
#[derive(Debug, Default)]
pub struct LoggingSink {
    delivered: AtomicU64,
}

impl LoggingSink {
    /// A sink that has delivered nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events delivered so far.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ConsensusSink for LoggingSink {
    async fn deliver(&self, event: AdmittedEvent) {
        let total = self.delivered.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(
            id = %short_hex(&event.id),
            creator = %event.creator(),
            birth_round = event.birth_round(),
            total,
            "[bn-06] event delivered to sink"
        );
    }
}
