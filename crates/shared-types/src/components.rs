//! # Component Identity
//!
//! Stable identifiers for the node's components, used for startup status
//! reporting and log prefixes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one component of the node.
///
/// The numbering matches the crate layout (`bn-NN-*`); shared infrastructure
/// takes the ids after the numbered components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ComponentId {
    /// Membership resolution (bn-01).
    Membership = 1,
    /// Intake admission and validation (bn-02).
    Intake = 2,
    /// Durable pre-consensus event log (bn-03).
    EventStore = 3,
    /// Incident scratchpad (bn-04).
    Scratchpad = 4,
    /// Stage scheduler.
    Pipeline = 5,
    /// Bootstrap coordinator.
    Bootstrap = 6,
}

impl ComponentId {
    /// Human-readable component name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Membership => "Membership Resolver",
            Self::Intake => "Intake Admission",
            Self::EventStore => "Durable Event Store",
            Self::Scratchpad => "Incident Scratchpad",
            Self::Pipeline => "Pipeline Scheduler",
            Self::Bootstrap => "Bootstrap Coordinator",
        }
    }

    /// Short tag used as a log prefix, e.g. `[bn-03]`.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Membership => "bn-01",
            Self::Intake => "bn-02",
            Self::EventStore => "bn-03",
            Self::Scratchpad => "bn-04",
            Self::Pipeline => "bn-05",
            Self::Bootstrap => "bn-06",
        }
    }

    /// All components in startup-report order.
    #[must_use]
    pub fn all() -> Vec<ComponentId> {
        vec![
            Self::Membership,
            Self::Intake,
            Self::EventStore,
            Self::Scratchpad,
            Self::Pipeline,
            Self::Bootstrap,
        ]
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
