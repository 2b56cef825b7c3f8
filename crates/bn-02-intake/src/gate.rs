//! # Per-Peer Admission Gate
//!
//! Bounds admitted-but-unordered events per peer. Counters are fixed to the
//! membership view at construction, so the hot path is one atomic per peer
//! and peers never contend with each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};
use shared_types::{MembershipView, PeerId};

/// Which gate implementation the node runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GateKind {
    /// Bounded per-peer counters.
    #[default]
    PerPeer,
    /// No bounds. Trades unbounded memory risk for never stalling a
    /// legitimate fast peer.
    AlwaysAdmit,
}

/// Admission bookkeeping for events that are admitted but not yet ordered.
pub trait AdmissionGate: Send + Sync {
    /// Charges one slot for `peer`. Returns false when the peer is at its
    /// bound (or unknown to the gate); the event must not be admitted.
    fn try_admit(&self, peer: PeerId) -> bool;

    /// Returns one slot for `peer` after the consensus engine reported the
    /// event ordered or stale.
    ///
    /// # Panics
    ///
    /// Panics when `peer` has no admitted events. A release without a
    /// matching admit is a double-release bug in the caller and must surface,
    /// not be clamped away.
    fn release(&self, peer: PeerId);
}

/// Bounded gate: one atomic counter per member.
pub struct PerPeerGate {
    limit: u32,
    counters: HashMap<PeerId, AtomicU32>,
}

impl PerPeerGate {
    /// Builds counters for every member of `view`.
    #[must_use]
    pub fn new(view: &MembershipView, limit: u32) -> Self {
        let counters = view
            .node_ids()
            .map(|id| (id, AtomicU32::new(0)))
            .collect();
        Self { limit, counters }
    }

    /// The per-peer bound.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Events currently admitted-but-unordered for `peer`. Zero for unknown
    /// peers.
    #[must_use]
    pub fn admitted(&self, peer: PeerId) -> u32 {
        self.counters
            .get(&peer)
            .map_or(0, |c| c.load(Ordering::Acquire))
    }
}

impl AdmissionGate for PerPeerGate {
    fn try_admit(&self, peer: PeerId) -> bool {
        let Some(counter) = self.counters.get(&peer) else {
            return false;
        };
        counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .is_ok()
    }

    fn release(&self, peer: PeerId) {
        let Some(counter) = self.counters.get(&peer) else {
            panic!("admission release for unknown peer {peer}");
        };
        let released = counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        assert!(
            released,
            "admission release for {peer} with no admitted events (double release)"
        );
    }
}

/// Unbounded gate. `release` is a no-op, so double-release cannot be
/// detected in this mode.
pub struct AlwaysAdmit;

impl AdmissionGate for AlwaysAdmit {
    fn try_admit(&self, _peer: PeerId) -> bool {
        true
    }

    fn release(&self, _peer: PeerId) {}
}
