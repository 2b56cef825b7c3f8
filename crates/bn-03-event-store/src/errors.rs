//! Event store error types.
//!
//! Everything here is fatal to the node except where recovery policy says
//! otherwise: a failed durable write means the event cannot be vouched for,
//! and retrying is an operator decision, never this component's.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the durable event store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write, flush, or directory operation failed.
    #[error("durable log I/O failed on {}", .path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// Segment sequence numbers are not contiguous and policy forbids gaps.
    #[error("segment sequence gap: {missing_from}..={missing_to} absent")]
    GapDetected {
        /// First missing sequence number.
        missing_from: u64,
        /// Last missing sequence number.
        missing_to: u64,
    },

    /// A sealed segment failed its integrity scan.
    #[error("segment {} is corrupt at offset {offset}", .path.display())]
    SegmentCorrupt {
        /// The damaged file.
        path: PathBuf,
        /// Byte offset of the record that failed validation.
        offset: u64,
    },

    /// The directory contents violate the segment layout rules.
    #[error("unexpected segment layout: {detail}")]
    Layout {
        /// What was found.
        detail: String,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
