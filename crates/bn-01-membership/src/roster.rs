//! # Bootstrap Roster Loading
//!
//! The roster is the operator-maintained JSON file naming every member of
//! the network. It is read once at bootstrap and validated into a
//! [`MembershipView`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use shared_types::{Member, MembershipView, ViewError};
use tracing::info;

use crate::errors::{MembershipError, MembershipResult};

/// On-disk roster shape.
#[derive(Debug, Serialize, Deserialize)]
struct RosterFile {
    members: Vec<Member>,
}

/// Loads and validates the bootstrap roster.
pub fn load_roster(path: &Path) -> MembershipResult<MembershipView> {
    let raw = std::fs::read_to_string(path).map_err(|source| MembershipError::RosterUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let file: RosterFile =
        serde_json::from_str(&raw).map_err(|source| MembershipError::RosterMalformed {
            path: path.to_path_buf(),
            source,
        })?;
    let view = MembershipView::new(file.members).map_err(|e| match e {
        ViewError::DuplicateNodeId { node_id } => MembershipError::DuplicateNodeId { node_id },
    })?;
    info!(
        path = %path.display(),
        members = view.len(),
        usable = view.usable_members(),
        total_weight = view.total_weight(),
        "[bn-01] bootstrap roster loaded"
    );
    Ok(view)
}
