//! # Data-Directory Lock
//!
//! Exclusive advisory lock (`fs2`, flock on Unix) on `braidnet.lock` inside
//! the data directory. Acquired before any data file is touched and held for
//! the life of the process; a second process fails fast instead of waiting.
//!
//! The file records the holder's PID so the refusal can name the owner. A
//! lock file left behind by a dead process does not block: the OS released
//! the flock with the process, and a held flock whose recorded PID is dead
//! is treated as stale and taken over.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::errors::{ConfigError, ConfigResult};

const LOCK_FILE: &str = "braidnet.lock";

/// Exclusive hold on a data directory. Released on drop.
#[derive(Debug)]
pub struct DataDirLock {
    file: File,
    path: PathBuf,
}

impl DataDirLock {
    /// Acquires the lock, creating the data directory if needed.
    ///
    /// # Errors
    ///
    /// `ConfigError::DataDirLocked` when another live process holds the
    /// directory; `ConfigError::Io` when the lock file itself cannot be
    /// created or written.
    pub fn acquire(data_dir: &Path) -> ConfigResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| ConfigError::io(data_dir, e))?;
        let lock_path = data_dir.join(LOCK_FILE);

        // One retry per stale takeover; a live holder exits the loop.
        for _ in 0..3 {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .open(&lock_path)
                .map_err(|e| ConfigError::io(&lock_path, e))?;

            match file.try_lock_exclusive() {
                Ok(()) => {
                    let pid = std::process::id();
                    write_pid(&file, pid).map_err(|e| ConfigError::io(&lock_path, e))?;
                    debug!(path = %lock_path.display(), pid, "[bn-06] data directory locked");
                    return Ok(Self {
                        file,
                        path: lock_path,
                    });
                }
                Err(_) => {
                    let holder = read_holder_pid(&lock_path);
                    if let Some(pid) = holder {
                        if !process_alive(pid) {
                            // Held flock but dead recorded holder: stale
                            // state, take the file over.
                            warn!(
                                path = %lock_path.display(),
                                stale_pid = pid,
                                "[bn-06] removing stale data directory lock"
                            );
                            drop(file);
                            let _ = std::fs::remove_file(&lock_path);
                            continue;
                        }
                    }
                    return Err(ConfigError::DataDirLocked {
                        path: data_dir.to_path_buf(),
                        pid: holder,
                    });
                }
            }
        }
        Err(ConfigError::DataDirLocked {
            path: data_dir.to_path_buf(),
            pid: None,
        })
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DataDirLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}

fn write_pid(mut file: &File, pid: u32) -> std::io::Result<()> {
    file.set_len(0)?;
    writeln!(file, "{pid}")?;
    file.sync_all()
}

fn read_holder_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

fn process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        Path::new(&format!("/proc/{pid}")).exists()
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}
