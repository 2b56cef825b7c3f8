//! # Gossip Front Door
//!
//! `EventIntake::submit` is the only way a raw event enters the node. It
//! validates attribution and signature, drops duplicates, charges the
//! admission gate, and hands the event to the intake stage without waiting:
//! a full stage queue surfaces as a backpressure rejection so the gossip
//! layer can pace itself.
//!
//! The intake also keeps the in-flight ledger (event id to charged peer)
//! that turns the consensus engine's ordered/stale callbacks into gate
//! releases.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared_pipeline::{StageHandle, SubmitError};
use shared_types::{
    AdmissionResult, AdmittedEvent, BackpressureCause, EventId, GossipEvent, InvalidCause,
    MembershipView, PeerId, PublicKey, RejectReason, Round,
};
use tracing::{debug, trace, warn};

use crate::dedup::{RecentEventIndex, DEFAULT_MAX_ENTRIES, DEFAULT_ROLL_INTERVAL};
use crate::gate::{AdmissionGate, GateKind};

/// Intake tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    /// Admitted-but-unordered events allowed per peer.
    pub per_peer_limit: u32,
    /// Gate implementation to run.
    pub gate: GateKind,
    /// Largest accepted payload in bytes.
    pub max_payload_bytes: usize,
    /// Lifetime of one duplicate-index generation.
    pub dedup_roll_interval: Duration,
    /// Maximum entries per duplicate-index generation.
    pub dedup_max_entries: usize,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            per_peer_limit: 64,
            gate: GateKind::default(),
            max_payload_bytes: 1_048_576,
            dedup_roll_interval: DEFAULT_ROLL_INTERVAL,
            dedup_max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Event signature check, behind a trait so tests can substitute.
pub trait EventVerifier: Send + Sync {
    /// Whether `event` carries a valid signature for `public_key`.
    fn verify(&self, event: &GossipEvent, public_key: &PublicKey) -> bool;
}

/// Production verifier: Ed25519 over the event id.
pub struct Ed25519Verifier;

impl EventVerifier for Ed25519Verifier {
    fn verify(&self, event: &GossipEvent, public_key: &PublicKey) -> bool {
        shared_crypto::verify_event_signature(public_key, &event.id(), &event.signature).is_ok()
    }
}

/// Accepts every signature. Test and benchmark use only.
pub struct PermissiveVerifier;

impl EventVerifier for PermissiveVerifier {
    fn verify(&self, _event: &GossipEvent, _public_key: &PublicKey) -> bool {
        true
    }
}

/// The gossip-facing intake front door.
pub struct EventIntake {
    view: MembershipView,
    gate: Arc<dyn AdmissionGate>,
    verifier: Arc<dyn EventVerifier>,
    dedup: Mutex<RecentEventIndex>,
    in_flight: Mutex<HashMap<EventId, PeerId>>,
    stage: StageHandle<AdmittedEvent>,
    max_payload_bytes: usize,
}

impl EventIntake {
    /// Wires the front door to the intake stage.
    #[must_use]
    pub fn new(
        view: MembershipView,
        gate: Arc<dyn AdmissionGate>,
        verifier: Arc<dyn EventVerifier>,
        stage: StageHandle<AdmittedEvent>,
        config: &IntakeConfig,
    ) -> Self {
        Self {
            view,
            gate,
            verifier,
            dedup: Mutex::new(RecentEventIndex::with_params(
                config.dedup_roll_interval,
                config.dedup_max_entries,
            )),
            in_flight: Mutex::new(HashMap::new()),
            stage,
            max_payload_bytes: config.max_payload_bytes,
        }
    }

    /// Submits a raw event from `peer`.
    ///
    /// Never blocks and never panics; every outcome is a typed result.
    pub fn submit(&self, peer: PeerId, event: GossipEvent) -> AdmissionResult {
        if !self.view.contains(peer) {
            return AdmissionResult::Rejected(RejectReason::Invalid(InvalidCause::UnknownPeer));
        }
        let Some(creator) = self.view.member(event.creator) else {
            return AdmissionResult::Rejected(RejectReason::Invalid(InvalidCause::UnknownCreator));
        };
        if event.payload.len() > self.max_payload_bytes {
            return AdmissionResult::Rejected(RejectReason::Invalid(InvalidCause::PayloadTooLarge {
                size: event.payload.len(),
                max: self.max_payload_bytes,
            }));
        }
        if !self.verifier.verify(&event, &creator.public_key) {
            warn!(peer = %peer, creator = %event.creator, "[bn-02] bad event signature");
            return AdmissionResult::Rejected(RejectReason::Invalid(InvalidCause::BadSignature));
        }

        let id = event.id();
        if !self.dedup.lock().observe(&id) {
            trace!(peer = %peer, "[bn-02] duplicate event dropped");
            return AdmissionResult::Rejected(RejectReason::Invalid(InvalidCause::DuplicateEvent));
        }
        // A duplicate can outlive the rolling index while still unordered;
        // the in-flight ledger is the backstop.
        if self.in_flight.lock().contains_key(&id) {
            trace!(peer = %peer, "[bn-02] event already in flight");
            return AdmissionResult::Rejected(RejectReason::Invalid(InvalidCause::DuplicateEvent));
        }

        if !self.gate.try_admit(peer) {
            debug!(peer = %peer, "[bn-02] peer at admission limit");
            return AdmissionResult::Rejected(RejectReason::Backpressure(
                BackpressureCause::PeerAtLimit,
            ));
        }
        self.in_flight.lock().insert(id, peer);

        match self.stage.try_submit(AdmittedEvent { id, event }) {
            Ok(()) => AdmissionResult::Admitted { id },
            Err(SubmitError::QueueFull { .. }) | Err(SubmitError::Closed { .. }) => {
                // Undo the charge; the caller retries once the queue moves.
                self.in_flight.lock().remove(&id);
                self.dedup.lock().forget(&id);
                self.gate.release(peer);
                AdmissionResult::Rejected(RejectReason::Backpressure(
                    BackpressureCause::IntakeQueueFull,
                ))
            }
        }
    }

    /// Consensus engine callback: the event reached consensus in `round`.
    pub fn on_consensus_reached(&self, id: EventId, round: Round) {
        self.release(id, Some(round));
    }

    /// Consensus engine callback: the event will never reach consensus.
    pub fn on_stale(&self, id: EventId) {
        self.release(id, None);
    }

    /// Marks `ids` as already seen without charging any peer.
    ///
    /// Called once at startup with the ids replayed from the durable log, so
    /// a peer re-gossiping an event the node already stored gets a duplicate
    /// rejection instead of a second admission.
    pub fn preload_recent<I>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = EventId>,
    {
        let mut dedup = self.dedup.lock();
        let mut loaded = 0;
        for id in ids {
            if dedup.observe(&id) {
                loaded += 1;
            }
        }
        loaded
    }

    /// Events currently admitted but not yet ordered or stale.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    fn release(&self, id: EventId, round: Option<Round>) {
        let peer = self.in_flight.lock().remove(&id);
        match peer {
            Some(peer) => {
                match round {
                    Some(round) => {
                        trace!(peer = %peer, round, "[bn-02] event ordered, releasing slot");
                    }
                    None => trace!(peer = %peer, "[bn-02] event stale, releasing slot"),
                }
                self.gate.release(peer);
            }
            // Replayed events were admitted by an earlier process lifetime
            // and carry no charge here.
            None => debug!(
                id = %shared_types::short_hex(&id),
                "[bn-02] release for event with no in-flight charge"
            ),
        }
    }
}
