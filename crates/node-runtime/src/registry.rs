//! # Capability Registry
//!
//! The node's operation surface, built once at startup after every component
//! is wired: gossip submission, the consensus engine's release callbacks,
//! incident recording, ancient-round pruning, and health queries. Nothing
//! behind the registry is global; it holds exactly the handles bootstrap
//! gave it.
//!
//! After `Ready` the runtime logs a status table over every component and
//! the registered capabilities.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bn_02_intake::EventIntake;
use bn_03_event_store::{EventStore, StoreResult};
use bn_04_scratchpad::{IncidentKind, IncidentRecord, IncidentScratchpad, ScratchpadResult};
use parking_lot::Mutex;
use shared_pipeline::HealthSnapshot;
use shared_types::{
    AdmissionResult, ComponentId, EventId, GossipEvent, PeerId, Round,
};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::context::NodeContext;

/// One operation the node exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Gossip hands in a raw event.
    SubmitEvent,
    /// The consensus engine reports an event ordered.
    ReleaseConsensus,
    /// The consensus engine reports an event stale.
    ReleaseStale,
    /// A divergence observation is persisted.
    RecordIncident,
    /// Ancient segments are removed from durable storage.
    PruneAncient,
    /// The latest pipeline health snapshot is read.
    QueryHealth,
}

impl OperationKind {
    /// Stable operation name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SubmitEvent => "submit-event",
            Self::ReleaseConsensus => "release-consensus",
            Self::ReleaseStale => "release-stale",
            Self::RecordIncident => "record-incident",
            Self::PruneAncient => "prune-ancient",
            Self::QueryHealth => "query-health",
        }
    }

    /// Every operation, in registration order.
    #[must_use]
    pub fn all() -> Vec<OperationKind> {
        vec![
            Self::SubmitEvent,
            Self::ReleaseConsensus,
            Self::ReleaseStale,
            Self::RecordIncident,
            Self::PruneAncient,
            Self::QueryHealth,
        ]
    }
}

/// Handlers for every [`OperationKind`], fixed for the process lifetime.
pub struct CapabilityRegistry {
    context: NodeContext,
    intake: Arc<EventIntake>,
    store: Arc<Mutex<EventStore>>,
    scratchpad: Arc<Mutex<IncidentScratchpad>>,
    health: watch::Receiver<HealthSnapshot>,
    /// Highest round the consensus engine has reported. Drives pruning.
    latest_round: AtomicU64,
    ancient_round_offset: u64,
}

impl CapabilityRegistry {
    /// Binds every operation to the components bootstrap built.
    #[must_use]
    pub fn new(
        context: NodeContext,
        intake: Arc<EventIntake>,
        store: Arc<Mutex<EventStore>>,
        scratchpad: Arc<Mutex<IncidentScratchpad>>,
        health: watch::Receiver<HealthSnapshot>,
        ancient_round_offset: u64,
    ) -> Self {
        // The durable log may know of rounds newer than the snapshot.
        let stored = store.lock().latest_round().unwrap_or(0);
        let latest_round = AtomicU64::new(context.snapshot_round.max(stored));
        for operation in OperationKind::all() {
            debug!(operation = operation.name(), "[bn-06] capability registered");
        }
        Self {
            context,
            intake,
            store,
            scratchpad,
            health,
            latest_round,
            ancient_round_offset,
        }
    }

    /// Gossip entry point; see `EventIntake::submit`.
    pub fn submit_event(&self, peer: PeerId, event: GossipEvent) -> AdmissionResult {
        self.intake.submit(peer, event)
    }

    /// The engine ordered `id` in `round`; releases the creator's gate slot
    /// and advances the pruning horizon.
    pub fn release_consensus(&self, id: EventId, round: Round) {
        self.latest_round.fetch_max(round, Ordering::AcqRel);
        self.intake.on_consensus_reached(id, round);
    }

    /// The engine gave up on `id`; releases the gate slot.
    pub fn release_stale(&self, id: EventId) {
        self.intake.on_stale(id);
    }

    /// Persists a divergence observation attributed to this node.
    ///
    /// Returns false when the same (round, kind) is already on file.
    pub fn record_incident(&self, round: Round, kind: IncidentKind) -> ScratchpadResult<bool> {
        self.scratchpad
            .lock()
            .record(IncidentRecord::new(round, self.context.node_id, kind))
    }

    /// Removes segments whose events are all ancient.
    ///
    /// Rounds at or above `latest_round - ancient_round_offset` stay; with
    /// no consensus progress yet nothing is ancient and nothing is removed.
    pub fn prune_ancient(&self) -> StoreResult<u32> {
        let latest = self.latest_round.load(Ordering::Acquire);
        let threshold = latest.saturating_sub(self.ancient_round_offset);
        if threshold == 0 {
            return Ok(0);
        }
        self.store.lock().prune_older_than(threshold)
    }

    /// Latest round the engine has reported, or the snapshot round.
    #[must_use]
    pub fn latest_round(&self) -> Round {
        self.latest_round.load(Ordering::Acquire)
    }

    /// The most recent health sample.
    #[must_use]
    pub fn query_health(&self) -> HealthSnapshot {
        self.health.borrow().clone()
    }

    /// Logs the post-`Ready` status table.
    pub fn log_status(&self) {
        info!("===========================================");
        info!("  BRAIDNET COMPONENT STATUS");
        info!("===========================================");
        for id in ComponentId::all() {
            info!("  [{}] {:22} {}", id.tag(), id.name(), self.component_detail(id));
        }
        info!("===========================================");
        let names: Vec<&str> = OperationKind::all().iter().map(|o| o.name()).collect();
        info!("  capabilities: {}", names.join(", "));
    }

    fn component_detail(&self, id: ComponentId) -> String {
        match id {
            ComponentId::Membership => format!(
                "{} members, changed={}",
                self.context.view.len(),
                self.context.membership_changed
            ),
            ComponentId::Intake => format!("{} in flight", self.intake.in_flight()),
            ComponentId::EventStore => {
                let store = self.store.lock();
                let counters = store.counters();
                format!(
                    "{} segments, latest round {:?}, {} appended",
                    store.segment_count(),
                    store.latest_round(),
                    counters.events_appended
                )
            }
            ComponentId::Scratchpad => {
                format!("{} incidents on file", self.scratchpad.lock().len())
            }
            ComponentId::Pipeline => {
                let snapshot = self.health.borrow();
                let stalled = snapshot.stages.iter().filter(|s| s.stalled).count();
                format!("{} stages, {} stalled", snapshot.stages.len(), stalled)
            }
            ComponentId::Bootstrap => format!(
                "{:?} start, snapshot round {}",
                self.context.start, self.context.snapshot_round
            ),
        }
    }
}
