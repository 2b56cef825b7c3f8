//! # Core Domain Entities
//!
//! Defines the identity and membership entities used across the node.
//!
//! ## Clusters
//!
//! - **Identity**: `Hash`, `Signature`, `PublicKey`, `NodeId`, `Round`
//! - **Membership**: `Member`, `MembershipView`

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// A 32-byte SHA-256 hash.
pub type Hash = [u8; 32];

/// A 64-byte Ed25519 signature.
pub type Signature = [u8; 64];

/// A 32-byte Ed25519 public key.
pub type PublicKey = [u8; 32];

/// Content hash identifying a gossip event.
pub type EventId = Hash;

/// Unique identifier for a node in the network.
///
/// Node ids are assigned by the operator in the bootstrap roster and stay
/// stable across restarts and software upgrades.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Creates a node id from its numeric form.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the numeric form.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// A peer identifier (alias for `NodeId` in gossip contexts).
pub type PeerId = NodeId;

/// A consensus-assigned logical clock value grouping events that become
/// ordered together.
pub type Round = u64;

/// The first round of a network's history.
pub const FIRST_ROUND: Round = 1;

/// Renders the leading bytes of a hash as lowercase hex for log output.
#[must_use]
pub fn short_hex(bytes: &[u8]) -> String {
    hex::encode(&bytes[..bytes.len().min(8)])
}

// =============================================================================
// CLUSTER B: MEMBERSHIP
// =============================================================================

/// A single member of the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// The member's stable identity.
    pub node_id: NodeId,
    /// Network address the member gossips from (`host:port`).
    pub address: String,
    /// Ed25519 public key used to verify the member's event signatures.
    pub public_key: PublicKey,
    /// Stake weight for voting power. Zero-weight members are carried in the
    /// view but cannot vote.
    pub weight: u64,
}

impl Member {
    /// Whether this member counts toward consensus.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.weight > 0
    }
}

/// An immutable, ordered membership view.
///
/// Exactly one view is current at any instant; at most one previous view is
/// retained across a membership change for rollback comparison. Views are
/// replaced whole, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipView {
    members: Vec<Member>,
}

impl MembershipView {
    /// Builds a view from a member list, ordering members by node id.
    ///
    /// Fails if two members share a node id.
    pub fn new(mut members: Vec<Member>) -> Result<Self, ViewError> {
        members.sort_by_key(|m| m.node_id);
        for pair in members.windows(2) {
            if pair[0].node_id == pair[1].node_id {
                return Err(ViewError::DuplicateNodeId {
                    node_id: pair[0].node_id,
                });
            }
        }
        Ok(Self { members })
    }

    /// Members in node-id order.
    #[must_use]
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Number of members, usable or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the view has no members at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether `node_id` belongs to this view.
    #[must_use]
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.member(node_id).is_some()
    }

    /// Looks up a member by node id.
    #[must_use]
    pub fn member(&self, node_id: NodeId) -> Option<&Member> {
        self.members
            .binary_search_by_key(&node_id, |m| m.node_id)
            .ok()
            .map(|i| &self.members[i])
    }

    /// Sum of all member weights. Widened to avoid overflow on large stakes.
    #[must_use]
    pub fn total_weight(&self) -> u128 {
        self.members.iter().map(|m| u128::from(m.weight)).sum()
    }

    /// Number of members with non-zero weight.
    #[must_use]
    pub fn usable_members(&self) -> usize {
        self.members.iter().filter(|m| m.is_usable()).count()
    }

    /// Node ids in view order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.members.iter().map(|m| m.node_id)
    }
}

/// Error constructing a membership view.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    /// Two members claimed the same node id.
    #[error("duplicate node id {node_id} in membership view")]
    DuplicateNodeId {
        /// The id that appeared more than once.
        node_id: NodeId,
    },
}
