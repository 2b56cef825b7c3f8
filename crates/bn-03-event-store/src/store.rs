//! # Event Store
//!
//! The single-writer facade over the segmented log. One pipeline stage owns
//! the store exclusively, so no internal locking is needed; `&mut self` on
//! every mutating call is the whole concurrency story.
//!
//! ## Durability Contract
//!
//! `append` returns only after the framed record is written and fsynced.
//! Callers release the event downstream strictly after `append` succeeds,
//! which is what lets a recovered node vouch for everything it ever
//! forwarded.

use std::fs;
use std::path::PathBuf;

use shared_types::{AdmittedEvent, Round};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::errors::{StoreError, StoreResult};
use crate::recovery::{self, RecoveryReport};
use crate::segment::{RecordRead, SegmentMeta, SegmentPosition, SegmentReader};
use crate::writer::{self, OpenSegment};

/// Running totals since the store was opened. Cheap to copy into status
/// reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounters {
    /// Events appended this run.
    pub events_appended: u64,
    /// Framed bytes written this run.
    pub bytes_written: u64,
    /// Segments sealed this run.
    pub segments_sealed: u64,
    /// Segments deleted by pruning this run.
    pub segments_pruned: u64,
}

/// Append-only, crash-recoverable log of admitted events.
#[derive(Debug)]
pub struct EventStore {
    dir: PathBuf,
    config: StoreConfig,
    sealed: Vec<SegmentMeta>,
    tail: Option<OpenSegment>,
    next_sequence: u64,
    snapshot_floor: Option<Round>,
    counters: StoreCounters,
}

impl EventStore {
    /// Open the store at `dir`, creating the directory if needed and
    /// running crash recovery over whatever it holds.
    pub fn open(dir: impl Into<PathBuf>, config: StoreConfig) -> StoreResult<(Self, RecoveryReport)> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let (sealed, report) = recovery::recover(&dir, &config)?;
        info!(
            segments = report.segments,
            events = report.events_recovered,
            truncated_bytes = report.truncated_bytes,
            next_sequence = report.next_sequence,
            "[bn-03] durable log recovered"
        );

        let store = Self {
            dir,
            config,
            sealed,
            tail: None,
            next_sequence: report.next_sequence,
            snapshot_floor: None,
            counters: StoreCounters::default(),
        };
        Ok((store, report))
    }

    /// Durably append one event. Returns where it landed.
    ///
    /// The open segment is rolled before the write if this event's birth
    /// round would stretch it past the configured span, and after the write
    /// once the size threshold is reached.
    pub fn append(&mut self, event: &AdmittedEvent) -> StoreResult<SegmentPosition> {
        let payload = bincode::serialize(event).map_err(|e| StoreError::Layout {
            detail: format!(
                "event {} failed to serialize: {e}",
                shared_types::short_hex(&event.id)
            ),
        })?;
        let round = event.birth_round();

        let span_exceeded = self
            .tail
            .as_ref()
            .is_some_and(|tail| tail.would_exceed_span(round, self.config.segment_max_round_span));
        if span_exceeded {
            self.roll()?;
        }

        let tail = match &mut self.tail {
            Some(tail) => tail,
            vacant @ None => {
                let segment = OpenSegment::create(&self.dir, self.next_sequence)?;
                debug!(sequence = self.next_sequence, "[bn-03] opened tail segment");
                self.next_sequence += 1;
                vacant.insert(segment)
            }
        };

        let offset = tail.append(&payload, round)?;
        let position = SegmentPosition {
            segment: tail.sequence(),
            offset,
        };
        self.counters.events_appended += 1;
        self.counters.bytes_written += payload.len() as u64 + crate::segment::RECORD_HEADER_BYTES;

        if tail.bytes() >= self.config.segment_max_bytes {
            self.roll()?;
        }
        Ok(position)
    }

    /// Seal the open tail, if any. The next append starts a new segment.
    pub fn roll(&mut self) -> StoreResult<()> {
        if let Some(tail) = self.tail.take() {
            let sequence = tail.sequence();
            let floor = self.sealed.last().map(|m| m.min_round);
            if let Some(meta) = tail.seal(floor)? {
                info!(
                    sequence,
                    min_round = meta.min_round,
                    max_round = meta.max_round,
                    "[bn-03] segment sealed"
                );
                self.counters.segments_sealed += 1;
                self.sealed.push(meta);
            } else {
                // Empty tail deleted; its sequence number is free again.
                self.next_sequence = sequence;
            }
        }
        Ok(())
    }

    /// Raise the snapshot floor. Pruning never deletes the segment covering
    /// this round, so a node can always rebuild from its latest snapshot.
    pub fn set_snapshot_floor(&mut self, round: Round) {
        self.snapshot_floor = Some(round);
    }

    /// Delete sealed segments whose whole round range lies below
    /// `threshold`. Deletion walks from the oldest segment and stops at the
    /// first keeper, so the surviving log is always a contiguous suffix.
    /// The open tail and the segment covering the snapshot floor are never
    /// deleted. Returns how many segments were removed.
    pub fn prune_older_than(&mut self, threshold: Round) -> StoreResult<u32> {
        let mut keep_from = 0usize;
        for meta in &self.sealed {
            if meta.max_round >= threshold {
                break;
            }
            if self.snapshot_floor.is_some_and(|floor| meta.covers(floor)) {
                break;
            }
            keep_from += 1;
        }

        let mut removed = 0u32;
        for meta in self.sealed.drain(..keep_from) {
            fs::remove_file(&meta.path).map_err(|e| StoreError::io(&meta.path, e))?;
            info!(
                sequence = meta.sequence,
                max_round = meta.max_round,
                threshold,
                "[bn-03] ancient segment pruned"
            );
            removed += 1;
        }
        if removed > 0 {
            writer::sync_dir(&self.dir)?;
            self.counters.segments_pruned += u64::from(removed);
        }
        Ok(removed)
    }

    /// Stream every stored event oldest-first: sealed segments in sequence
    /// order, then the open tail.
    #[must_use]
    pub fn replay(&self) -> EventReplay {
        let mut files: Vec<PathBuf> = self.sealed.iter().map(|m| m.path.clone()).collect();
        if let Some(tail) = &self.tail {
            files.push(tail.path().to_path_buf());
        }
        EventReplay {
            files: files.into_iter(),
            current: None,
        }
    }

    /// Sealed segment count plus the open tail.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.sealed.len() + usize::from(self.tail.is_some())
    }

    /// Highest round watermark across the whole log.
    #[must_use]
    pub fn latest_round(&self) -> Option<Round> {
        let sealed_max = self.sealed.last().map(|m| m.max_round);
        let tail_max = self.tail.as_ref().and_then(OpenSegment::max_round);
        match (sealed_max, tail_max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    /// Running totals since open.
    #[must_use]
    pub fn counters(&self) -> StoreCounters {
        self.counters
    }
}

/// Streaming iterator over stored events, oldest first.
pub struct EventReplay {
    files: std::vec::IntoIter<PathBuf>,
    current: Option<SegmentReader>,
}

impl Iterator for EventReplay {
    type Item = StoreResult<AdmittedEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(reader) = self.current.as_mut() {
                match reader.next_record() {
                    Ok(RecordRead::Record(payload)) => {
                        return Some(bincode::deserialize(&payload).map_err(|e| {
                            StoreError::Layout {
                                detail: format!(
                                    "undecodable record in {}: {e}",
                                    reader.path().display()
                                ),
                            }
                        }))
                    }
                    Ok(RecordRead::Torn { offset }) => {
                        let path = reader.path().to_path_buf();
                        self.current = None;
                        return Some(Err(StoreError::SegmentCorrupt { path, offset }));
                    }
                    Ok(RecordRead::Eof) => {
                        self.current = None;
                    }
                    Err(e) => {
                        self.current = None;
                        return Some(Err(e));
                    }
                }
                continue;
            }

            let path = self.files.next()?;
            match SegmentReader::open(path) {
                Ok(reader) => self.current = Some(reader),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
