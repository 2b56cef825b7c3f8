//! # Crash Recovery
//!
//! Rebuilds the store's in-memory picture of the log from the directory
//! listing, verifies every sealed segment end to end, and repairs the tail:
//!
//! 1. Parse filenames; foreign files are skipped with a warning.
//! 2. Enforce layout rules: one open tail at most, no duplicate sequences,
//!    the tail newest, sequences contiguous (subject to [`GapPolicy`]).
//! 3. CRC-scan every sealed segment. Damage in sealed data is fatal since
//!    those bytes were fsynced and renamed while the node was healthy.
//! 4. Scan the tail, truncate a torn final record, then seal what survives
//!    or delete the file if nothing does.
//!
//! Recovery never leaves an open file behind. The store creates a fresh
//! tail on the first append after startup, so a crash loop cannot grow a
//! pile of half-used segments.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use shared_types::{AdmittedEvent, Round};
use tracing::{info, warn};

use crate::config::{GapPolicy, StoreConfig};
use crate::errors::{StoreError, StoreResult};
use crate::segment::{parse_file_name, BoundKind, ParsedName, RecordRead, SegmentMeta, SegmentReader};
use crate::writer;

/// What recovery found and did. Returned to the caller so startup can log
/// and act on it (a truncation is an incident worth recording).
#[derive(Debug, Clone, Default)]
pub struct RecoveryReport {
    /// Sealed segments surviving recovery, the repaired tail included.
    pub segments: usize,
    /// Total records across surviving segments.
    pub events_recovered: u64,
    /// Bytes cut from a torn tail. Zero after a clean shutdown.
    pub truncated_bytes: u64,
    /// Record frames dropped by the truncation.
    pub discarded_records: u64,
    /// Missing sequence ranges, populated only under [`GapPolicy::Allow`].
    pub gaps: Vec<(u64, u64)>,
    /// Surviving segments whose watermarks use the legacy round convention.
    pub legacy_segments: usize,
    /// Adjacent segments whose lower watermarks regress. Logged, not fatal.
    pub bound_anomalies: usize,
    /// Whether a non-empty tail was found and sealed.
    pub sealed_tail: bool,
    /// Sequence number the next open segment must use.
    pub next_sequence: u64,
}

impl RecoveryReport {
    /// Whether recovery had to repair anything.
    #[must_use]
    pub fn repaired(&self) -> bool {
        self.truncated_bytes > 0 || !self.gaps.is_empty()
    }
}

/// Scan `dir` and return the surviving sealed segments in sequence order
/// plus the report of what was done.
pub(crate) fn recover(
    dir: &Path,
    config: &StoreConfig,
) -> StoreResult<(Vec<SegmentMeta>, RecoveryReport)> {
    let mut report = RecoveryReport::default();
    let (mut sealed, open_tails) = list_segments(dir)?;

    if open_tails.len() > 1 {
        return Err(StoreError::Layout {
            detail: format!("{} open segments present, expected at most one", open_tails.len()),
        });
    }
    let tail = open_tails.into_iter().next();

    sealed.sort_by_key(|meta| meta.sequence);
    for pair in sealed.windows(2) {
        if pair[0].sequence == pair[1].sequence {
            return Err(StoreError::Layout {
                detail: format!("duplicate segment sequence {}", pair[0].sequence),
            });
        }
    }
    if let (Some((tail_seq, _)), Some(last)) = (&tail, sealed.last()) {
        if *tail_seq <= last.sequence {
            return Err(StoreError::Layout {
                detail: format!(
                    "open segment {tail_seq} is not the newest (sealed log reaches {})",
                    last.sequence
                ),
            });
        }
    }

    check_contiguity(&sealed, tail.as_ref().map(|(seq, _)| *seq), config, &mut report)?;

    let mut prev_min: Option<Round> = None;
    for meta in &sealed {
        report.events_recovered += scan_sealed(meta)?;
        if meta.bound_kind == BoundKind::LegacyRound {
            report.legacy_segments += 1;
            info!(
                sequence = meta.sequence,
                "[bn-03] segment uses legacy round watermarks"
            );
        }
        if let Some(prev) = prev_min {
            if meta.min_round < prev {
                report.bound_anomalies += 1;
                warn!(
                    sequence = meta.sequence,
                    min_round = meta.min_round,
                    previous_min = prev,
                    "[bn-03] segment lower watermark regresses"
                );
            }
        }
        prev_min = Some(meta.min_round);
    }

    report.next_sequence = match tail {
        Some((sequence, path)) => {
            recover_tail(&path, sequence, sealed.last().map(|m| m.min_round), &mut sealed, &mut report)?
        }
        None => sealed.last().map_or(0, |meta| meta.sequence + 1),
    };
    report.segments = sealed.len();

    Ok((sealed, report))
}

/// Parse the directory listing into sealed metas and open tails.
fn list_segments(dir: &Path) -> StoreResult<(Vec<SegmentMeta>, Vec<(u64, PathBuf)>)> {
    let mut sealed = Vec::new();
    let mut open_tails = Vec::new();

    for entry in fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))? {
        let entry = entry.map_err(|e| StoreError::io(dir, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            warn!(path = %entry.path().display(), "[bn-03] ignoring non-UTF-8 file name");
            continue;
        };
        match parse_file_name(name) {
            Some(ParsedName::Sealed {
                sequence,
                bound_kind,
                min_round,
                max_round,
            }) => sealed.push(SegmentMeta {
                sequence,
                bound_kind,
                min_round,
                max_round,
                path: entry.path(),
            }),
            Some(ParsedName::Open { sequence }) => open_tails.push((sequence, entry.path())),
            None => {
                if entry.path().is_file() {
                    warn!(file = name, "[bn-03] ignoring foreign file in log directory");
                }
            }
        }
    }

    Ok((sealed, open_tails))
}

/// Verify sequences are contiguous, applying the gap policy.
fn check_contiguity(
    sealed: &[SegmentMeta],
    tail_sequence: Option<u64>,
    config: &StoreConfig,
    report: &mut RecoveryReport,
) -> StoreResult<()> {
    let mut sequences: Vec<u64> = sealed.iter().map(|m| m.sequence).collect();
    if let Some(seq) = tail_sequence {
        sequences.push(seq);
    }

    for pair in sequences.windows(2) {
        if pair[1] > pair[0] + 1 {
            let missing_from = pair[0] + 1;
            let missing_to = pair[1] - 1;
            match config.gap_policy {
                GapPolicy::Forbid => {
                    return Err(StoreError::GapDetected {
                        missing_from,
                        missing_to,
                    })
                }
                GapPolicy::Allow => {
                    warn!(
                        missing_from,
                        missing_to,
                        "[bn-03] segment sequence gap tolerated by policy"
                    );
                    report.gaps.push((missing_from, missing_to));
                }
            }
        }
    }
    Ok(())
}

/// CRC-scan one sealed segment. Returns its record count.
fn scan_sealed(meta: &SegmentMeta) -> StoreResult<u64> {
    let mut reader = SegmentReader::open(&meta.path)?;
    let mut records = 0u64;
    loop {
        match reader.next_record()? {
            RecordRead::Record(_) => records += 1,
            RecordRead::Torn { offset } => {
                return Err(StoreError::SegmentCorrupt {
                    path: meta.path.clone(),
                    offset,
                })
            }
            RecordRead::Eof => break,
        }
    }
    if records == 0 {
        return Err(StoreError::Layout {
            detail: format!("sealed segment {} contains no records", meta.sequence),
        });
    }
    Ok(records)
}

/// Scan the open tail, truncate torn data, then seal or delete the file.
/// Returns the next sequence number to write.
fn recover_tail(
    path: &Path,
    sequence: u64,
    floor_min: Option<Round>,
    sealed: &mut Vec<SegmentMeta>,
    report: &mut RecoveryReport,
) -> StoreResult<u64> {
    let mut reader = SegmentReader::open(path)?;
    let mut records = 0u64;
    let mut min_round: Option<Round> = None;
    let mut max_round: Option<Round> = None;
    let mut valid_end = 0u64;
    let mut torn_at: Option<u64> = None;

    loop {
        let frame_start = reader.offset();
        match reader.next_record()? {
            RecordRead::Record(payload) => {
                match bincode::deserialize::<AdmittedEvent>(&payload) {
                    Ok(event) => {
                        let round = event.birth_round();
                        min_round = Some(min_round.map_or(round, |m| m.min(round)));
                        max_round = Some(max_round.map_or(round, |m| m.max(round)));
                        records += 1;
                        valid_end = reader.offset();
                    }
                    Err(_) => {
                        // CRC passed but the payload is not an event. Treat
                        // it like torn data from this frame onward.
                        torn_at = Some(frame_start);
                        break;
                    }
                }
            }
            RecordRead::Torn { offset } => {
                torn_at = Some(offset);
                break;
            }
            RecordRead::Eof => break,
        }
    }
    drop(reader);

    if let Some(cut) = torn_at {
        let file_len = fs::metadata(path).map_err(|e| StoreError::io(path, e))?.len();
        report.truncated_bytes = file_len - cut;
        report.discarded_records = 1;
        debug_assert_eq!(cut, valid_end);
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;
        file.set_len(cut).map_err(|e| StoreError::io(path, e))?;
        file.sync_all().map_err(|e| StoreError::io(path, e))?;
        warn!(
            sequence,
            truncated_bytes = report.truncated_bytes,
            "[bn-03] torn record truncated from tail segment"
        );
    }

    if records == 0 {
        fs::remove_file(path).map_err(|e| StoreError::io(path, e))?;
        if let Some(dir) = path.parent() {
            writer::sync_dir(dir)?;
        }
        info!(sequence, "[bn-03] empty tail segment removed");
        return Ok(sequence);
    }

    let (min, max) = match (min_round, max_round) {
        (Some(min), Some(max)) => (min, max),
        _ => {
            return Err(StoreError::Layout {
                detail: format!("tail segment {sequence} holds records but no round bounds"),
            })
        }
    };
    let meta = writer::seal_file(path, sequence, min, max, floor_min)?;
    info!(
        sequence,
        records,
        min_round = meta.min_round,
        max_round = meta.max_round,
        "[bn-03] tail segment sealed during recovery"
    );
    sealed.push(meta);
    report.events_recovered += records;
    report.sealed_tail = true;
    Ok(sequence + 1)
}
