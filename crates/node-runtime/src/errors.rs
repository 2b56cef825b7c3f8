//! Runtime configuration and bootstrap refusal errors.
//!
//! Everything here stops the process before it reaches Ready. Component
//! errors (membership, store, scratchpad) keep their own types; bootstrap
//! wraps both in `anyhow` context on the way out.

use std::path::PathBuf;

use shared_types::Round;
use thiserror::Error;

/// Errors that prevent the node from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration field failed validation.
    #[error("invalid configuration: {field}: {reason}")]
    Invalid {
        /// The offending field.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// Another live process holds the data directory.
    #[error("data directory {} is locked by another process{}", .path.display(), fmt_pid(.pid))]
    DataDirLocked {
        /// The contested directory.
        path: PathBuf,
        /// Holder's PID when the lock file recorded one.
        pid: Option<u32>,
    },

    /// The persisted marker was written by a newer build.
    #[error("refusing downgrade: running {running}, data directory written by {persisted}")]
    DowngradeRefused {
        /// Version of the running build.
        running: String,
        /// Version recorded in the marker.
        persisted: String,
    },

    /// The scratchpad holds an unresolved incident.
    #[error(
        "refusing restart: incident recorded at round {incident_round}, \
         snapshot round is {snapshot_round} (set the unsafe-restart override to proceed)"
    )]
    UnsafeRestart {
        /// Round of the newest blocking incident.
        incident_round: Round,
        /// Snapshot round the incident is measured against.
        snapshot_round: Round,
    },

    /// The version marker exists but cannot be parsed.
    #[error("version marker {} is malformed: {detail}", .path.display())]
    MarkerMalformed {
        /// Marker file path.
        path: PathBuf,
        /// Parse failure description.
        detail: String,
    },

    /// Lock or marker file I/O failed.
    #[error("startup I/O failed on {}", .path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

fn fmt_pid(pid: &Option<u32>) -> String {
    match pid {
        Some(pid) => format!(" (pid {pid})"),
        None => String::new(),
    }
}

/// Result alias for runtime configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
