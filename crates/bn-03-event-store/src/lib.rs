//! # Durable Event Store (bn-03)
//!
//! Append-only, segmented, crash-recoverable log of admitted events. Every
//! event is written and fsynced here before it is released downstream, so a
//! crash can never silently lose an event the node has vouched for.
//!
//! ## Segment Lifecycle
//!
//! ```text
//!   append()            roll (size or round span)         prune
//! ┌───────────┐  seal: atomic rename  ┌────────────┐  ┌───────────┐
//! │   Open    │ ────────────────────▶ │   Sealed   │─▶│  Deleted  │
//! │ (tail only)│                      │ (immutable)│  │ (ancient) │
//! └───────────┘                       └────────────┘  └───────────┘
//! ```
//!
//! Only the tail segment is ever open. Sealed filenames embed the sequence
//! number, the round-bound convention, and the min/max round watermarks, so
//! recovery needs no side index. Records carry a CRC so a torn tail from a
//! crash mid-write is detected and physically discarded.

pub mod config;
pub mod errors;
pub mod recovery;
pub mod segment;
pub mod store;
mod writer;

pub use config::{GapPolicy, StoreConfig};
pub use errors::{StoreError, StoreResult};
pub use recovery::RecoveryReport;
pub use segment::{BoundKind, SegmentMeta, SegmentPosition};
pub use store::{EventReplay, EventStore, StoreCounters};
