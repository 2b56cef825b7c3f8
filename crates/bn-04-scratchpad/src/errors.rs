//! Scratchpad error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the incident scratchpad.
#[derive(Debug, Error)]
pub enum ScratchpadError {
    /// Reading or writing the scratchpad file failed.
    #[error("scratchpad I/O failed on {}", .path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// The scratchpad file exists but does not parse.
    #[error("scratchpad file {} is malformed", .path.display())]
    Malformed {
        /// The unreadable file.
        path: PathBuf,
        /// Parse failure detail.
        #[source]
        source: serde_json::Error,
    },
}

impl ScratchpadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for scratchpad operations.
pub type ScratchpadResult<T> = Result<T, ScratchpadError>;
