//! Membership error types.

use std::path::PathBuf;

use shared_types::NodeId;
use thiserror::Error;

/// Errors from membership resolution and roster loading.
///
/// Every variant is a configuration problem: fatal, reported, and the
/// process does not start.
#[derive(Debug, Error)]
pub enum MembershipError {
    /// The resolved view has no member with voting weight.
    #[error("resolved membership view has no usable (non-zero-weight) members")]
    NoUsableMembers,

    /// The local node is missing from the resolved view.
    #[error("local node {node_id} is not part of the resolved membership view")]
    SelfNotInView {
        /// The local node's id.
        node_id: NodeId,
    },

    /// Two roster entries claimed the same node id.
    #[error("duplicate node id {node_id} in bootstrap roster")]
    DuplicateNodeId {
        /// The id that appeared more than once.
        node_id: NodeId,
    },

    /// The roster file could not be read.
    #[error("cannot read bootstrap roster {}", .path.display())]
    RosterUnreadable {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The roster file is not valid JSON for the expected shape.
    #[error("bootstrap roster {} is malformed", .path.display())]
    RosterMalformed {
        /// Path that was parsed.
        path: PathBuf,
        /// Underlying parse failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Result alias for membership operations.
pub type MembershipResult<T> = Result<T, MembershipError>;
