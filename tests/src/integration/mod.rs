//! # Integration Flows
//!
//! Cross-crate scenarios: events entering through the intake and landing in
//! the durable log, recovery reconstructing exactly what was flushed, the
//! health monitor noticing a wedged stage, and the bootstrap coordinator
//! driving whole node lifetimes on a real data directory.

pub mod admission;
pub mod durability;
pub mod lifecycle;
pub mod scheduling;
