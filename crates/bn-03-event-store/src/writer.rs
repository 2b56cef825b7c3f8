//! Open-tail segment writer.
//!
//! Exactly one segment is writable at a time. Every append is flushed to
//! disk before it returns, so the caller may vouch for the event the moment
//! `append` succeeds. Sealing renames the file to its immutable form with
//! the round watermarks embedded in the name.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use shared_types::Round;
use tracing::debug;

use crate::errors::{StoreError, StoreResult};
use crate::segment::{self, BoundKind, SegmentMeta};

/// The writable tail of the log.
#[derive(Debug)]
pub(crate) struct OpenSegment {
    path: PathBuf,
    file: File,
    sequence: u64,
    bytes: u64,
    records: u64,
    min_round: Option<Round>,
    max_round: Option<Round>,
}

impl OpenSegment {
    /// Create a fresh tail file. Fails if the file already exists, which
    /// would mean two writers share the directory.
    pub(crate) fn create(dir: &Path, sequence: u64) -> StoreResult<Self> {
        let path = dir.join(segment::open_file_name(sequence));
        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;
        Ok(Self {
            path,
            file,
            sequence,
            bytes: 0,
            records: 0,
            min_round: None,
            max_round: None,
        })
    }

    pub(crate) fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn bytes(&self) -> u64 {
        self.bytes
    }

    pub(crate) fn max_round(&self) -> Option<Round> {
        self.max_round
    }

    /// Whether appending an event from `round` would stretch this segment
    /// past the configured round span.
    pub(crate) fn would_exceed_span(&self, round: Round, max_span: u64) -> bool {
        match (self.min_round, self.max_round) {
            (Some(min), Some(max)) => max.max(round) - min.min(round) + 1 > max_span,
            _ => false,
        }
    }

    /// Frame, write, and fsync one payload. Returns the byte offset the
    /// record was placed at.
    pub(crate) fn append(&mut self, payload: &[u8], round: Round) -> StoreResult<u64> {
        let offset = self.bytes;
        let written = segment::write_record(&mut self.file, payload)
            .map_err(|e| StoreError::io(&self.path, e))?;
        self.file
            .sync_all()
            .map_err(|e| StoreError::io(&self.path, e))?;
        self.bytes += written;
        self.records += 1;
        self.min_round = Some(self.min_round.map_or(round, |m| m.min(round)));
        self.max_round = Some(self.max_round.map_or(round, |m| m.max(round)));
        Ok(offset)
    }

    /// Seal this segment. An empty tail is deleted instead of sealed, and
    /// its sequence number may be reused.
    ///
    /// `floor_min` is the previous sealed segment's lower watermark; the new
    /// watermarks are raised to it if needed so bounds never move backwards
    /// across the log.
    pub(crate) fn seal(self, floor_min: Option<Round>) -> StoreResult<Option<SegmentMeta>> {
        let Self {
            path,
            file,
            sequence,
            records,
            min_round,
            max_round,
            ..
        } = self;
        drop(file);

        if records == 0 {
            fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
            return Ok(None);
        }

        let (min, max) = match (min_round, max_round) {
            (Some(min), Some(max)) => (min, max),
            _ => {
                return Err(StoreError::Layout {
                    detail: format!("segment {sequence} holds records but no round bounds"),
                })
            }
        };

        seal_file(&path, sequence, min, max, floor_min).map(Some)
    }
}

/// Rename an open file into its sealed form, raising the watermarks to
/// `floor_min` when the observed bounds would regress. Also used by recovery
/// to seal a surviving tail.
pub(crate) fn seal_file(
    path: &Path,
    sequence: u64,
    min_round: Round,
    max_round: Round,
    floor_min: Option<Round>,
) -> StoreResult<SegmentMeta> {
    let mut min = min_round;
    if let Some(floor) = floor_min {
        if min < floor {
            debug!(
                sequence,
                observed = min,
                floor,
                "[bn-03] raising segment lower watermark to keep bounds monotone"
            );
            min = floor;
        }
    }
    let max = max_round.max(min);

    let sealed_path =
        path.with_file_name(segment::sealed_file_name(sequence, BoundKind::BirthRound, min, max));
    fs::rename(path, &sealed_path).map_err(|e| StoreError::io(path, e))?;
    if let Some(dir) = sealed_path.parent() {
        sync_dir(dir)?;
    }

    Ok(SegmentMeta {
        sequence,
        bound_kind: BoundKind::BirthRound,
        min_round: min,
        max_round: max,
        path: sealed_path,
    })
}

/// Flush directory metadata so renames and deletes survive power loss.
pub(crate) fn sync_dir(dir: &Path) -> StoreResult<()> {
    let handle = File::open(dir).map_err(|e| StoreError::io(dir, e))?;
    handle.sync_all().map_err(|e| StoreError::io(dir, e))
}
