//! # Incident Scratchpad (bn-04)
//!
//! A small crash-persistent record of state-divergence incidents. When the
//! node's computed state hash disagrees with what the network signed, that
//! fact must survive any number of restarts: a node that diverged recently
//! cannot be trusted to rejoin without operator attention.
//!
//! The scratchpad is deliberately primitive. One JSON file, rewritten
//! atomically on every accepted record, loaded whole at startup and logged
//! in full so the incident history is always in the boot log. Records are
//! never deleted here; forgetting an incident is an operator action.

pub mod errors;
pub mod records;
pub mod scratchpad;

pub use errors::{ScratchpadError, ScratchpadResult};
pub use records::{IncidentKind, IncidentRecord};
pub use scratchpad::IncidentScratchpad;
