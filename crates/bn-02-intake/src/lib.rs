//! # Intake Admission (bn-02)
//!
//! The gossip-facing front door of the node. Every raw event passes four
//! checks before it reaches the durable log:
//!
//! 1. **Attribution**: sending peer and claimed creator must be members.
//! 2. **Validity**: payload bound and Ed25519 signature.
//! 3. **Novelty**: a rolling index drops recently seen event ids without
//!    charging anyone.
//! 4. **Admission**: the per-peer gate bounds how many events from one peer
//!    may sit admitted-but-unordered; at the bound the peer is refused until
//!    the consensus engine reports an event ordered or stale.
//!
//! Rejections are typed results, never errors; the gossip layer decides
//! whether to retry (backpressure) or drop (invalid).

pub mod dedup;
pub mod gate;
pub mod intake;

pub use dedup::RecentEventIndex;
pub use gate::{AdmissionGate, AlwaysAdmit, GateKind, PerPeerGate};
pub use intake::{
    Ed25519Verifier, EventIntake, EventVerifier, IntakeConfig, PermissiveVerifier,
};
