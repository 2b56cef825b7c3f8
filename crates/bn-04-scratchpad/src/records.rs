//! Incident record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::{NodeId, Round};

/// How a state-divergence incident was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncidentKind {
    /// This node's state hash disagreed with the weighted majority.
    SelfDivergence,
    /// A peer's signature disagreed with the majority state hash.
    PeerDivergence,
    /// No weighted majority agreed on any single state hash.
    CatastrophicDivergence,
}

impl std::fmt::Display for IncidentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::SelfDivergence => "self-divergence",
            Self::PeerDivergence => "peer-divergence",
            Self::CatastrophicDivergence => "catastrophic-divergence",
        };
        f.write_str(name)
    }
}

/// One recorded incident. Keyed by (round, kind); never overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentRecord {
    /// Consensus round the divergence was detected in.
    pub round: Round,
    /// Node that reported the divergence.
    pub reporter: NodeId,
    /// How the divergence was observed.
    pub kind: IncidentKind,
    /// When this record was written, reporter wall clock.
    pub recorded_at: DateTime<Utc>,
}

impl IncidentRecord {
    /// Builds a record stamped with the current wall-clock time.
    #[must_use]
    pub fn new(round: Round, reporter: NodeId, kind: IncidentKind) -> Self {
        Self {
            round,
            reporter,
            kind,
            recorded_at: Utc::now(),
        }
    }

    /// Idempotence key.
    #[must_use]
    pub fn key(&self) -> (Round, IncidentKind) {
        (self.round, self.kind)
    }
}
