//! # Software-Version Marker
//!
//! `node-marker.json` persists the software version, node id, membership
//! view, and snapshot round of the last clean bootstrap. On the next start
//! the coordinator compares the persisted version against the running build:
//!
//! - marker absent        → genesis start
//! - build == persisted   → ordinary restart
//! - build >  persisted   → upgrade boundary (migrations enabled)
//! - build <  persisted   → downgrade, refused
//!
//! The marker is rewritten only after a bootstrap fully succeeds, via a
//! temp file and atomic rename, so a crash mid-bootstrap leaves the previous
//! marker intact.

use std::cmp::Ordering;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};
use shared_types::{MembershipView, NodeId, Round};
use tracing::info;

use crate::errors::{ConfigError, ConfigResult};

/// File name inside the data directory.
pub const MARKER_FILE: &str = "node-marker.json";

/// State persisted by the last clean bootstrap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMarker {
    /// Semantic version of the build that wrote the marker.
    pub version: String,
    /// The node id that ran.
    pub node_id: NodeId,
    /// The membership view that governed the previous lifetime.
    pub membership: MembershipView,
    /// Round of the most recent consensus snapshot at write time.
    pub snapshot_round: Round,
}

/// How this process lifetime relates to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartKind {
    /// No marker: first start in this data directory.
    Genesis,
    /// Same version as the marker.
    Restart,
    /// Newer version than the marker.
    Upgrade,
}

impl StartKind {
    /// Whether this start crosses a software upgrade boundary.
    #[must_use]
    pub fn is_upgrade(self) -> bool {
        self == Self::Upgrade
    }
}

/// Reads the marker, or `None` on a genesis start.
pub fn load(path: &Path) -> ConfigResult<Option<NodeMarker>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ConfigError::io(path, e)),
    };
    let marker = serde_json::from_str(&raw).map_err(|e| ConfigError::MarkerMalformed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    Ok(Some(marker))
}

/// Atomically replaces the marker.
pub fn store(path: &Path, marker: &NodeMarker) -> ConfigResult<()> {
    let tmp = path.with_extension("json.tmp");
    let file = File::create(&tmp).map_err(|e| ConfigError::io(&tmp, e))?;
    serde_json::to_writer_pretty(&file, marker).map_err(|e| {
        ConfigError::io(&tmp, std::io::Error::new(std::io::ErrorKind::Other, e))
    })?;
    file.sync_all().map_err(|e| ConfigError::io(&tmp, e))?;
    drop(file);
    std::fs::rename(&tmp, path).map_err(|e| ConfigError::io(path, e))?;
    if let Some(parent) = path.parent() {
        let dir = File::open(parent).map_err(|e| ConfigError::io(parent, e))?;
        dir.sync_all().map_err(|e| ConfigError::io(parent, e))?;
    }
    info!(
        version = %marker.version,
        node_id = %marker.node_id,
        snapshot_round = marker.snapshot_round,
        "[bn-06] version marker written"
    );
    Ok(())
}

/// Classifies this start against the persisted marker.
///
/// # Errors
///
/// `ConfigError::DowngradeRefused` when the marker was written by a newer
/// build; `ConfigError::Invalid` when either version string does not parse
/// as `major.minor.patch`.
pub fn classify(running: &str, marker: Option<&NodeMarker>) -> ConfigResult<StartKind> {
    let Some(marker) = marker else {
        return Ok(StartKind::Genesis);
    };
    let running_parts = parse_version(running).ok_or_else(|| bad_version(running))?;
    let persisted_parts = parse_version(&marker.version).ok_or_else(|| bad_version(&marker.version))?;
    match running_parts.cmp(&persisted_parts) {
        Ordering::Equal => Ok(StartKind::Restart),
        Ordering::Greater => Ok(StartKind::Upgrade),
        Ordering::Less => Err(ConfigError::DowngradeRefused {
            running: running.to_string(),
            persisted: marker.version.clone(),
        }),
    }
}

/// Strict `major.minor.patch` with numeric components.
fn parse_version(version: &str) -> Option<(u64, u64, u64)> {
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor, patch))
}

fn bad_version(version: &str) -> ConfigError {
    ConfigError::invalid("version", format!("{version:?} is not major.minor.patch"))
}
