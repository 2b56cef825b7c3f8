//! # Membership Resolution (bn-01)
//!
//! Reconciles the operator's bootstrap roster against the membership view
//! persisted with the last durable state, producing the authoritative
//! current/previous view pair for this process lifetime.
//!
//! ## Resolution Rules
//!
//! - Genesis (no persisted view): the roster becomes current, unchanged.
//! - Roster equals persisted view: keep the persisted view, unchanged.
//! - Views differ: adopt the roster, retain the persisted view as previous,
//!   flag the change. Whether the difference comes from a software upgrade
//!   or an operator edit is signaled by the caller, never inferred here.
//!
//! Resolution is a pure function; the bootstrap coordinator persists the
//! outcome.

pub mod errors;
pub mod resolver;
pub mod roster;

pub use errors::{MembershipError, MembershipResult};
pub use resolver::{resolve, Resolution};
pub use roster::load_roster;
