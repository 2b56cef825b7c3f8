//! # Membership Resolver
//!
//! The pure core of bn-01: decides which membership view governs this
//! process lifetime.

use shared_types::{MembershipView, NodeId};
use tracing::{info, warn};

use crate::errors::{MembershipError, MembershipResult};

/// Outcome of membership resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The view that governs this process lifetime.
    pub current: MembershipView,
    /// The replaced view, retained for rollback comparison. Present only
    /// when `changed` is true.
    pub previous: Option<MembershipView>,
    /// Whether the current view differs from the persisted one.
    pub changed: bool,
}

/// Resolves the governing membership view for this process lifetime.
///
/// `is_upgrade` is the caller's signal that a software upgrade boundary was
/// detected; it does not alter the adoption rule, only how an adoption is
/// reported. The resolved view must contain the local node and at least one
/// usable member.
pub fn resolve(
    self_id: NodeId,
    bootstrap: MembershipView,
    persisted: Option<MembershipView>,
    is_upgrade: bool,
) -> MembershipResult<Resolution> {
    let resolution = match persisted {
        None => {
            info!(
                members = bootstrap.len(),
                "[bn-01] genesis: adopting bootstrap roster"
            );
            Resolution {
                current: bootstrap,
                previous: None,
                changed: false,
            }
        }
        Some(persisted) if persisted == bootstrap => {
            info!(
                members = persisted.len(),
                "[bn-01] roster matches persisted membership, keeping view"
            );
            Resolution {
                current: persisted,
                previous: None,
                changed: false,
            }
        }
        Some(persisted) => {
            if is_upgrade {
                info!(
                    from = persisted.len(),
                    to = bootstrap.len(),
                    "[bn-01] upgrade boundary: adopting bootstrap roster over persisted membership"
                );
            } else {
                warn!(
                    from = persisted.len(),
                    to = bootstrap.len(),
                    "[bn-01] roster changed on ordinary restart, adopting operator-driven membership change"
                );
            }
            Resolution {
                current: bootstrap,
                previous: Some(persisted),
                changed: true,
            }
        }
    };

    if resolution.current.usable_members() == 0 {
        return Err(MembershipError::NoUsableMembers);
    }
    if !resolution.current.contains(self_id) {
        return Err(MembershipError::SelfNotInView { node_id: self_id });
    }
    Ok(resolution)
}
