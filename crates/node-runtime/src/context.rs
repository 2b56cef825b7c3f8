//! Identity and membership facts fixed for one process lifetime.

use shared_types::{MembershipView, NodeId, Round};

use crate::marker::StartKind;

/// What bootstrap resolved; read-only after Ready.
#[derive(Debug, Clone)]
pub struct NodeContext {
    /// This node's id.
    pub node_id: NodeId,
    /// The membership view governing this lifetime.
    pub view: MembershipView,
    /// The replaced view when the roster changed, for rollback comparison.
    pub previous_view: Option<MembershipView>,
    /// Whether the governing view differs from the persisted one.
    pub membership_changed: bool,
    /// Genesis, restart, or upgrade.
    pub start: StartKind,
    /// Snapshot round inherited from the version marker (0 at genesis).
    pub snapshot_round: Round,
}
