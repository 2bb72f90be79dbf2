//! Advisory lock files: the crash-safety layer.
//!
//! Every lock key maps to one file under `<state>/locks/`, named by hashing
//! the key so the path is stable across restarts and safe for any key.
//!
//! # Semantics
//!
//! Files are created with **create_new** semantics (exclusive create), so at
//! most one contender wins a given instant. The holder keeps the file's mtime
//! fresh from a background thread; a file whose mtime is older than the stale
//! threshold belongs to an owner that most likely died without releasing, and
//! any contender may remove it.
//!
//! The lock file is not the ownership authority (the lock table row is). It is
//! the transient mutex for the insert race and the only cross-process signal
//! that an owner is dead.

mod handle;
mod metadata;

#[cfg(test)]
mod tests;

pub use handle::FileLockHandle;
pub use metadata::{LockFileMetadata, format_age};

use crate::error::{AgentLockError, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Liveness timing for lock files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileLockOptions {
    /// Files not refreshed for longer than this are abandoned.
    pub stale_threshold: Duration,
    /// How often a holder touches its file. Must be below `stale_threshold`.
    pub refresh_interval: Duration,
}

impl Default for FileLockOptions {
    fn default() -> Self {
        Self {
            stale_threshold: Duration::from_secs(30),
            refresh_interval: Duration::from_secs(10),
        }
    }
}

/// Lock files for every key, rooted at one directory.
#[derive(Debug, Clone)]
pub struct FileLocks {
    dir: PathBuf,
    options: FileLockOptions,
}

impl FileLocks {
    pub fn new<P: Into<PathBuf>>(dir: P, options: FileLockOptions) -> Self {
        Self {
            dir: dir.into(),
            options,
        }
    }

    pub fn options(&self) -> FileLockOptions {
        self.options
    }

    /// Deterministic lock file path for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let hex: String = digest.iter().take(16).map(|b| format!("{:02x}", b)).collect();
        self.dir.join(format!("{}.lock", hex))
    }

    /// Try to take the lock file for `key` without blocking.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(handle))` - The file was created; the refresher is running
    /// * `Ok(None)` - The file already exists (another holder, live or stale)
    /// * `Err(_)` - The locks directory or file could not be written
    pub fn try_lock(&self, key: &str, target: &str) -> Result<Option<FileLockHandle>> {
        self.ensure_dir()?;
        let path = self.path_for(key);

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(key, path = %path.display(), "lock file already held");
                return Ok(None);
            }
            Err(e) => {
                return Err(AgentLockError::IoError(format!(
                    "failed to create lock file '{}': {}",
                    path.display(),
                    e
                )));
            }
        };

        let metadata = LockFileMetadata::new(key, target);
        let written = metadata
            .to_json()
            .and_then(|json| {
                file.write_all(json.as_bytes())
                    .and_then(|_| file.sync_all())
                    .map_err(|e| {
                        AgentLockError::IoError(format!("failed to write lock metadata: {}", e))
                    })
            });
        if let Err(e) = written {
            // Clean up the lock file on write failure
            let _ = fs::remove_file(&path);
            return Err(e);
        }

        Ok(Some(FileLockHandle::start(
            path,
            metadata.token,
            self.options.refresh_interval,
        )))
    }

    /// Resume holding a lock file recorded by an earlier instance of a session.
    ///
    /// The file is rewritten with a fresh token, so any handle still holding
    /// the previous token stops refreshing and can no longer remove it.
    pub fn adopt(&self, key: &str, target: &str, path: &Path) -> Result<FileLockHandle> {
        self.ensure_dir()?;

        let metadata = LockFileMetadata::new(key, target);
        fs::write(path, metadata.to_json()?).map_err(|e| {
            AgentLockError::IoError(format!(
                "failed to rewrite lock file '{}': {}",
                path.display(),
                e
            ))
        })?;
        debug!(key, path = %path.display(), "adopted lock file");

        Ok(FileLockHandle::start(
            path.to_path_buf(),
            metadata.token,
            self.options.refresh_interval,
        ))
    }

    /// Best-effort removal of a lock file this process does not hold.
    ///
    /// Returns whether a file was removed.
    pub fn unlock(&self, path: &Path) -> bool {
        match fs::remove_file(path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to remove lock file");
                false
            }
        }
    }

    /// Time since the lock file was last refreshed, or `None` if it is missing.
    pub fn age(&self, path: &Path) -> Option<Duration> {
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
        // An mtime in the future (clock skew) counts as fresh.
        Some(SystemTime::now().duration_since(modified).unwrap_or_default())
    }

    /// Whether the lock file's owner should be presumed dead.
    ///
    /// A missing file is stale: a live holder always has one.
    pub fn is_stale(&self, path: &Path) -> bool {
        match self.age(path) {
            Some(age) => age > self.options.stale_threshold,
            None => true,
        }
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|e| {
                AgentLockError::IoError(format!(
                    "failed to create locks directory '{}': {}",
                    self.dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}
