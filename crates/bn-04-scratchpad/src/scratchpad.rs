//! The scratchpad file and its operations.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shared_types::Round;
use tracing::{info, warn};

use crate::errors::{ScratchpadError, ScratchpadResult};
use crate::records::IncidentRecord;

/// On-disk shape of the scratchpad file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ScratchpadFile {
    incidents: Vec<IncidentRecord>,
}

/// Crash-persistent, append-only record of state-divergence incidents.
///
/// `record` is synchronous and durable: when it returns `Ok`, the incident
/// is on disk. The whole file is rewritten through a temp file and rename,
/// so a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct IncidentScratchpad {
    path: PathBuf,
    records: Vec<IncidentRecord>,
}

impl IncidentScratchpad {
    /// Load the scratchpad at `path`, creating parent directories. A missing
    /// file is an empty scratchpad; a malformed file is an error, since
    /// silently dropping incident history defeats the point.
    pub fn open(path: impl Into<PathBuf>) -> ScratchpadResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ScratchpadError::io(parent, e))?;
        }

        let records = match fs::read(&path) {
            Ok(bytes) => {
                let file: ScratchpadFile =
                    serde_json::from_slice(&bytes).map_err(|e| ScratchpadError::Malformed {
                        path: path.clone(),
                        source: e,
                    })?;
                file.incidents
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(ScratchpadError::io(&path, e)),
        };

        Ok(Self { path, records })
    }

    /// Durably record an incident. Returns `false` when a record with the
    /// same (round, kind) key already exists, in which case nothing is
    /// rewritten.
    pub fn record(&mut self, record: IncidentRecord) -> ScratchpadResult<bool> {
        if self.records.iter().any(|r| r.key() == record.key()) {
            return Ok(false);
        }
        warn!(
            round = record.round,
            reporter = %record.reporter,
            kind = %record.kind,
            "[bn-04] state divergence incident recorded"
        );
        self.records.push(record);
        self.persist()?;
        Ok(true)
    }

    /// Log every record for startup diagnostics.
    pub fn log_contents(&self) {
        if self.records.is_empty() {
            info!("[bn-04] incident scratchpad is empty");
            return;
        }
        for record in &self.records {
            info!(
                round = record.round,
                reporter = %record.reporter,
                kind = %record.kind,
                recorded_at = %record.recorded_at.to_rfc3339(),
                "[bn-04] incident on file"
            );
        }
    }

    /// Whether any incident was recorded at or after `round`.
    #[must_use]
    pub fn has_incident_at_or_after(&self, round: Round) -> bool {
        self.records.iter().any(|r| r.round >= round)
    }

    /// The most recent incident at or after `round`, for error reporting.
    #[must_use]
    pub fn latest_at_or_after(&self, round: Round) -> Option<&IncidentRecord> {
        self.records
            .iter()
            .filter(|r| r.round >= round)
            .max_by_key(|r| r.round)
    }

    /// Number of records on file.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the scratchpad holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rewrite the file atomically: temp file, fsync, rename, dir fsync.
    fn persist(&self) -> ScratchpadResult<()> {
        let tmp_path = self.path.with_extension("json.tmp");
        let file = File::create(&tmp_path).map_err(|e| ScratchpadError::io(&tmp_path, e))?;
        let contents = ScratchpadFile {
            incidents: self.records.clone(),
        };
        serde_json::to_writer_pretty(&file, &contents).map_err(|e| {
            ScratchpadError::io(
                &tmp_path,
                std::io::Error::new(std::io::ErrorKind::Other, e),
            )
        })?;
        file.sync_all().map_err(|e| ScratchpadError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| ScratchpadError::io(&self.path, e))?;
        sync_parent(&self.path)
    }
}

fn sync_parent(path: &Path) -> ScratchpadResult<()> {
    if let Some(dir) = path.parent() {
        let handle = File::open(dir).map_err(|e| ScratchpadError::io(dir, e))?;
        handle.sync_all().map_err(|e| ScratchpadError::io(dir, e))?;
    }
    Ok(())
}
