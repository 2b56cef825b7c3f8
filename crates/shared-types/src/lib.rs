//! # Shared Types Crate
//!
//! This crate contains the identity, membership, and event types shared by
//! every subsystem of the node.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: all cross-subsystem types are defined here.
//! - **Immutable Views**: a `MembershipView` is replaced, never mutated; the
//!   current/previous pair is managed by the bootstrap coordinator.
//! - **Cheap Identity**: event ids are content hashes computed once and
//!   carried alongside the event, so downstream stages never re-hash.

pub mod components;
pub mod entities;
pub mod events;

pub use components::ComponentId;
pub use entities::*;
pub use events::*;
