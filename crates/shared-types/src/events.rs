//! # Gossip Events
//!
//! The event is the atom consensus ordering operates on: a payload plus up to
//! two parent references (self-parent, other-parent) braided into the gossip
//! graph. Events arrive raw from peers, pass intake admission, and become
//! [`AdmittedEvent`]s owned by the durable log until the consensus engine
//! reports them ordered or stale.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

use crate::entities::{EventId, NodeId, Round, Signature};

/// A gossip-layer event as received from a peer.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GossipEvent {
    /// Node that created the event.
    pub creator: NodeId,
    /// Id of the creator's previous event. Absent for a creator's first event.
    pub self_parent: Option<EventId>,
    /// Id of the gossip partner's event this one descends from.
    pub other_parent: Option<EventId>,
    /// Round in which the creator built the event.
    pub birth_round: Round,
    /// Creator wall-clock time, Unix milliseconds.
    pub created_at: u64,
    /// Opaque application payload.
    pub payload: Vec<u8>,
    /// Creator's Ed25519 signature over the event id.
    #[serde_as(as = "Bytes")]
    pub signature: Signature,
}

impl GossipEvent {
    /// Computes the event id: SHA-256 over every field except the signature.
    #[must_use]
    pub fn id(&self) -> EventId {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.creator.as_u64().to_le_bytes());
        match &self.self_parent {
            Some(parent) => {
                hasher.update([1u8]);
                hasher.update(parent);
            }
            None => hasher.update([0u8]),
        }
        match &self.other_parent {
            Some(parent) => {
                hasher.update([1u8]);
                hasher.update(parent);
            }
            None => hasher.update([0u8]),
        }
        hasher.update(self.birth_round.to_le_bytes());
        hasher.update(self.created_at.to_le_bytes());
        hasher.update((self.payload.len() as u64).to_le_bytes());
        hasher.update(&self.payload);
        hasher.finalize().into()
    }
}

/// An event accepted by intake, owned by the durable log until the consensus
/// engine reports it ordered or stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmittedEvent {
    /// Content id of `event`, computed once at admission.
    pub id: EventId,
    /// The event exactly as received.
    pub event: GossipEvent,
}

impl AdmittedEvent {
    /// Wraps an event, caching its id.
    #[must_use]
    pub fn new(event: GossipEvent) -> Self {
        Self {
            id: event.id(),
            event,
        }
    }

    /// Node that created the event.
    #[must_use]
    pub fn creator(&self) -> NodeId {
        self.event.creator
    }

    /// Round in which the event was created.
    #[must_use]
    pub fn birth_round(&self) -> Round {
        self.event.birth_round
    }
}

/// Outcome of submitting a raw event at the gossip boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionResult {
    /// Event accepted; the durable log now owns it.
    Admitted {
        /// Content id assigned to the event.
        id: EventId,
    },
    /// Event refused; the reason says whether the caller may retry.
    Rejected(RejectReason),
}

impl AdmissionResult {
    /// Whether the event was accepted.
    #[must_use]
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }
}

/// Why a submission was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Transient refusal. The gossip layer may retry after backing off.
    Backpressure(BackpressureCause),
    /// Permanent refusal. Retrying the same event cannot succeed.
    Invalid(InvalidCause),
}

/// What produced a transient refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressureCause {
    /// The sending peer is at its admitted-but-unordered event limit.
    PeerAtLimit,
    /// The intake stage queue is full.
    IntakeQueueFull,
}

/// What made an event unacceptable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidCause {
    /// Signature does not verify against the creator's public key.
    BadSignature,
    /// Creator is not part of the current membership view.
    UnknownCreator,
    /// Sending peer is not part of the current membership view.
    UnknownPeer,
    /// Payload exceeds the configured maximum.
    PayloadTooLarge {
        /// Actual payload size in bytes.
        size: usize,
        /// Configured maximum in bytes.
        max: usize,
    },
    /// Event was already seen recently. Dropped without charging the peer.
    DuplicateEvent,
}
