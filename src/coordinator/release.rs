//! Session release.

use super::{HeldLock, LockCoordinator};
use crate::error::Result;
use crate::filelock::FileLockHandle;
use crate::notify::{LockStatus, emit};
use tracing::{debug, info, warn};

impl LockCoordinator {
    /// Release every lock held by `session` and drop all of its queue entries.
    ///
    /// Covers keys held through this instance, keys recorded by an earlier
    /// instance of the session, and waits the session abandoned. Emits one
    /// `released` notification carrying the number of locks released.
    pub fn release_session(&self, session: &str) -> Result<usize> {
        let records = self.store.delete_locks_for_session(session)?;

        for record in &records {
            match self.take_held(&record.key, session) {
                Some(handle) => {
                    if let Err(e) = handle.release() {
                        warn!(key = %record.key, error = %e, "failed to remove lock file");
                    }
                }
                None => {
                    // Held by an instance that is gone; remove what it left.
                    self.files.unlock(&record.lock_file_path);
                }
            }
        }

        // Cached handles whose records were reaped while we were unresponsive.
        let leftovers: Vec<HeldLock> = {
            let mut held = self.held();
            let keys: Vec<String> = held
                .iter()
                .filter(|(_, h)| h.session == session)
                .map(|(key, _)| key.clone())
                .collect();
            keys.iter().filter_map(|key| held.remove(key)).collect()
        };
        for leftover in leftovers {
            debug!(path = %leftover.handle.path().display(), "dropping unrecorded cached lock");
            if let Err(e) = leftover.handle.release() {
                warn!(error = %e, "failed to remove lock file");
            }
        }

        let dequeued = self.store.dequeue_session(session)?;

        info!(session, released = records.len(), dequeued, "session released");
        emit(
            self.sink.as_ref(),
            &LockStatus::released(session, records.len()),
        );
        Ok(records.len())
    }

    /// Remove the cached handle for `key` if `session` holds it.
    pub(super) fn take_held(&self, key: &str, session: &str) -> Option<FileLockHandle> {
        let mut held = self.held();
        if held.get(key).is_some_and(|h| h.session == session) {
            held.remove(key).map(|h| h.handle)
        } else {
            None
        }
    }
}
