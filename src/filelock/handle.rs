//! Held lock files and their mtime refresher.

use super::metadata::LockFileMetadata;
use crate::error::{AgentLockError, Result};
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// A lock file held by this process.
///
/// While held, a background thread touches the file's mtime every refresh
/// interval so contenders can tell the owner is alive. Dropping the handle
/// stops the refresher and removes the file; removal failures are logged,
/// never panicked on.
#[derive(Debug)]
pub struct FileLockHandle {
    path: PathBuf,
    token: String,
    refresher: Option<Refresher>,
    released: bool,
}

#[derive(Debug)]
struct Refresher {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

impl FileLockHandle {
    pub(super) fn start(path: PathBuf, token: String, refresh_interval: Duration) -> Self {
        let (stop, rx) = mpsc::channel::<()>();
        let thread_path = path.clone();
        let thread_token = token.clone();

        let thread = thread::spawn(move || {
            loop {
                match rx.recv_timeout(refresh_interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if !refresh(&thread_path, &thread_token) {
                            break;
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        Self {
            path,
            token,
            refresher: Some(Refresher { stop, thread }),
            released: false,
        }
    }

    /// Get the path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file on disk still carries this handle's token.
    pub fn is_intact(&self) -> bool {
        owns_file(&self.path, &self.token)
    }

    /// Release the lock: stop refreshing and remove the file.
    ///
    /// A file that is already gone, or that now belongs to another holder, is
    /// left alone and counts as released.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.stop_refresher();
        remove_if_owned(&self.path, &self.token)
    }

    /// Stop refreshing but leave the file behind, as a crashed holder would.
    #[cfg(test)]
    pub(crate) fn abandon(mut self) {
        self.released = true;
        self.stop_refresher();
    }

    fn stop_refresher(&mut self) {
        if let Some(refresher) = self.refresher.take() {
            let _ = refresher.stop.send(());
            if refresher.thread.join().is_err() {
                warn!(path = %self.path.display(), "lock refresher thread panicked");
            }
        }
    }
}

impl Drop for FileLockHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.stop_refresher();
        if let Err(e) = remove_if_owned(&self.path, &self.token) {
            warn!(error = %e, "failed to release lock file on drop");
        }
    }
}

fn owns_file(path: &Path, token: &str) -> bool {
    LockFileMetadata::from_file(path)
        .map(|meta| meta.token == token)
        .unwrap_or(false)
}

/// Touch the lock file. Returns `false` when refreshing should stop.
fn refresh(path: &Path, token: &str) -> bool {
    if !owns_file(path, token) {
        warn!(
            path = %path.display(),
            "lock file was removed or taken over; lock compromised, refresh stopped"
        );
        return false;
    }

    let touched = OpenOptions::new()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(SystemTime::now()));

    match touched {
        Ok(()) => {
            debug!(path = %path.display(), "refreshed lock file");
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "lock file vanished; refresh stopped");
            false
        }
        Err(e) => {
            // Transient failures only cost liveness; keep trying.
            warn!(path = %path.display(), error = %e, "failed to refresh lock file");
            true
        }
    }
}

fn remove_if_owned(path: &Path, token: &str) -> Result<()> {
    if !owns_file(path, token) {
        debug!(path = %path.display(), "lock file not ours anymore; nothing to remove");
        return Ok(());
    }

    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AgentLockError::IoError(format!(
            "failed to release lock '{}': {}",
            path.display(),
            e
        ))),
    }
}
