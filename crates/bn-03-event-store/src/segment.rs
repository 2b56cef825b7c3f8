//! # Segment Naming and Record Framing
//!
//! Sealed segment filenames are the store's only metadata: they carry the
//! sequence number, the round-bound convention tag, and the min/max round
//! watermarks. Recovery reconstructs the whole log state by parsing the
//! directory listing, so there is no side index to keep consistent.
//!
//! ## Filename Grammar
//!
//! ```text
//! segment-0000000042.open                          (writable tail)
//! segment-0000000042-b-min0000000100-max0000000199.seg  (sealed, birth-round bounds)
//! segment-0000000007-r-min0000000001-max0000000099.seg  (sealed, legacy-round bounds)
//! ```
//!
//! ## Record Framing
//!
//! ```text
//! ┌──────────────┬──────────────┬─────────────────┐
//! │ len: u32 LE  │ crc32: u32 LE│ payload (len B) │
//! └──────────────┴──────────────┴─────────────────┘
//! ```
//!
//! The CRC covers the payload only. A crash mid-write leaves a record that
//! fails either the length or the CRC check; readers report it as torn and
//! the recovery pass truncates it away.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use shared_types::Round;

use crate::errors::{StoreError, StoreResult};

/// Bytes of framing in front of every record payload.
pub(crate) const RECORD_HEADER_BYTES: u64 = 8;

/// Upper bound on a single framed payload. Lengths above this are treated
/// as torn data, since no admitted event comes close.
pub(crate) const MAX_RECORD_BYTES: u32 = 32 * 1024 * 1024;

// ======================================================================
// ROUND-BOUND CONVENTIONS
// ======================================================================

/// Which round convention a sealed segment's bounds were computed under.
///
/// Current segments bound by the event's birth round. Segments written
/// before the birth-round cutover were bounded by the judging round and
/// stay readable; the tag in the filename tells recovery which rule built
/// the watermarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    /// Bounds are judging rounds (pre-cutover files).
    LegacyRound,
    /// Bounds are birth rounds (everything written today).
    BirthRound,
}

impl BoundKind {
    /// One-character filename tag.
    pub fn tag(self) -> char {
        match self {
            Self::LegacyRound => 'r',
            Self::BirthRound => 'b',
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "r" => Some(Self::LegacyRound),
            "b" => Some(Self::BirthRound),
            _ => None,
        }
    }
}

// ======================================================================
// SEGMENT METADATA
// ======================================================================

/// A sealed, immutable segment as described by its filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentMeta {
    /// Position in the log. Contiguous across the directory.
    pub sequence: u64,
    /// Which round convention the watermarks use.
    pub bound_kind: BoundKind,
    /// Lowest round watermark.
    pub min_round: Round,
    /// Highest round watermark.
    pub max_round: Round,
    /// Full path of the sealed file.
    pub path: PathBuf,
}

impl SegmentMeta {
    /// Whether `round` falls inside this segment's watermark range.
    #[must_use]
    pub fn covers(&self, round: Round) -> bool {
        self.min_round <= round && round <= self.max_round
    }
}

/// Location of a single record inside the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPosition {
    /// Sequence number of the segment holding the record.
    pub segment: u64,
    /// Byte offset of the record's frame within that segment.
    pub offset: u64,
}

// ======================================================================
// FILENAME CODEC
// ======================================================================

/// Parsed form of a recognized segment filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParsedName {
    /// A writable tail, `segment-NNNNNNNNNN.open`.
    Open { sequence: u64 },
    /// A sealed file with embedded watermarks.
    Sealed {
        sequence: u64,
        bound_kind: BoundKind,
        min_round: Round,
        max_round: Round,
    },
}

pub(crate) fn open_file_name(sequence: u64) -> String {
    format!("segment-{sequence:010}.open")
}

pub(crate) fn sealed_file_name(
    sequence: u64,
    bound_kind: BoundKind,
    min_round: Round,
    max_round: Round,
) -> String {
    format!(
        "segment-{sequence:010}-{}-min{min_round:010}-max{max_round:010}.seg",
        bound_kind.tag()
    )
}

/// Parse a directory entry name. Returns `None` for anything that is not a
/// well-formed segment file, so foreign files can be skipped.
pub(crate) fn parse_file_name(name: &str) -> Option<ParsedName> {
    let rest = name.strip_prefix("segment-")?;

    if let Some(digits) = rest.strip_suffix(".open") {
        return Some(ParsedName::Open {
            sequence: parse_decimal(digits)?,
        });
    }

    let rest = rest.strip_suffix(".seg")?;
    let mut parts = rest.split('-');
    let sequence = parse_decimal(parts.next()?)?;
    let bound_kind = BoundKind::from_tag(parts.next()?)?;
    let min_round = parse_decimal(parts.next()?.strip_prefix("min")?)?;
    let max_round = parse_decimal(parts.next()?.strip_prefix("max")?)?;
    if parts.next().is_some() || min_round > max_round {
        return None;
    }

    Some(ParsedName::Sealed {
        sequence,
        bound_kind,
        min_round,
        max_round,
    })
}

fn parse_decimal(digits: &str) -> Option<u64> {
    if digits.len() != 10 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

// ======================================================================
// RECORD I/O
// ======================================================================

/// Frame `payload` and append it to `writer`. Returns bytes written.
pub(crate) fn write_record<W: Write>(writer: &mut W, payload: &[u8]) -> std::io::Result<u64> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "record payload too large")
    })?;
    let mut frame = Vec::with_capacity(RECORD_HEADER_BYTES as usize + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
    frame.extend_from_slice(payload);
    writer.write_all(&frame)?;
    Ok(frame.len() as u64)
}

/// Outcome of reading one record frame.
#[derive(Debug)]
pub(crate) enum RecordRead {
    /// A complete, CRC-valid payload.
    Record(Vec<u8>),
    /// The frame at `offset` is incomplete or fails its CRC.
    Torn { offset: u64 },
    /// Clean end of file.
    Eof,
}

/// Sequential reader over one segment file.
pub(crate) struct SegmentReader {
    reader: BufReader<File>,
    path: PathBuf,
    offset: u64,
}

impl SegmentReader {
    pub(crate) fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let file = File::open(&path).map_err(|e| StoreError::io(&path, e))?;
        Ok(Self {
            reader: BufReader::new(file),
            path,
            offset: 0,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Byte offset of the next unread frame.
    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    /// Read the next frame. Torn data is reported, not treated as an error;
    /// the caller decides whether torn means truncate (open tail) or fail
    /// (sealed segment).
    pub(crate) fn next_record(&mut self) -> StoreResult<RecordRead> {
        let mut header = [0u8; RECORD_HEADER_BYTES as usize];
        match self.read_fully(&mut header)? {
            0 => return Ok(RecordRead::Eof),
            n if n < header.len() => {
                return Ok(RecordRead::Torn {
                    offset: self.offset,
                })
            }
            _ => {}
        }

        let mut len_bytes = [0u8; 4];
        let mut crc_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&header[..4]);
        crc_bytes.copy_from_slice(&header[4..]);
        let len = u32::from_le_bytes(len_bytes);
        let expected_crc = u32::from_le_bytes(crc_bytes);

        if len == 0 || len > MAX_RECORD_BYTES {
            return Ok(RecordRead::Torn {
                offset: self.offset,
            });
        }

        let mut payload = vec![0u8; len as usize];
        if self.read_fully(&mut payload)? < payload.len() {
            return Ok(RecordRead::Torn {
                offset: self.offset,
            });
        }

        if crc32fast::hash(&payload) != expected_crc {
            return Ok(RecordRead::Torn {
                offset: self.offset,
            });
        }

        self.offset += RECORD_HEADER_BYTES + u64::from(len);
        Ok(RecordRead::Record(payload))
    }

    /// Fill as much of `buf` as the file provides. Returns bytes read,
    /// which is short only at end of file.
    fn read_fully(&mut self, buf: &mut [u8]) -> StoreResult<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(StoreError::io(&self.path, e)),
            }
        }
        Ok(filled)
    }
}
