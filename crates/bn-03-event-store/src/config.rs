//! Store configuration.

use serde::{Deserialize, Serialize};

/// Default segment roll threshold in bytes (16 MiB).
pub const DEFAULT_SEGMENT_MAX_BYTES: u64 = 16 * 1024 * 1024;

/// Default maximum round span a single segment may cover.
pub const DEFAULT_SEGMENT_MAX_ROUND_SPAN: u64 = 100;

/// What to do when recovery finds missing segment sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GapPolicy {
    /// Refuse to start. A gap means events this node vouched for are gone.
    #[default]
    Forbid,
    /// Log the gap, record it in the recovery report, and continue with
    /// whatever is left. For operator-driven salvage only.
    Allow,
}

/// Tunables for the durable event store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Seal the open segment once it holds at least this many bytes.
    pub segment_max_bytes: u64,
    /// Seal the open segment before it would span more than this many rounds.
    pub segment_max_round_span: u64,
    /// Recovery behavior when segment sequences are not contiguous.
    pub gap_policy: GapPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            segment_max_bytes: DEFAULT_SEGMENT_MAX_BYTES,
            segment_max_round_span: DEFAULT_SEGMENT_MAX_ROUND_SPAN,
            gap_policy: GapPolicy::Forbid,
        }
    }
}
