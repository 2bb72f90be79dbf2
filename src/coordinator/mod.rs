//! The lock coordinator: fair, crash-safe, cross-process locking per key.
//!
//! Ties together the durable [`LockStore`] (authoritative holder + FIFO queue)
//! and the [`FileLocks`] crash-safety layer (insert-race mutex + liveness).
//!
//! # Ownership layers
//!
//! 1. The lock table row names the holder. Every decision reads it.
//! 2. A process-local cache maps keys this instance holds to their file lock
//!    handles. It only short-circuits re-acquisition and lets release stop
//!    the refresher; it is never trusted without the row agreeing.
//!
//! # Deadlock
//!
//! Acquiring one key never waits on another key, so the coordinator cannot
//! deadlock by itself. Callers needing several keys must request them one at
//! a time in a consistent order.

mod acquire;
mod release;


use crate::context::StateContext;
use crate::error::Result;
use crate::filelock::{FileLockHandle, FileLockOptions, FileLocks, format_age};
use crate::key::LockKey;
use crate::notify::StatusSink;
use crate::store::{LockRecord, LockStore, QueueEntry, RetryPolicy};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Timing for the acquire loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorOptions {
    /// A waiter queued longer than this fails with a lock timeout.
    pub max_wait: Duration,
    /// Sleep between polls while waiting.
    pub poll_interval: Duration,
    /// Repeat an unchanged `waiting` notification at most this often.
    pub waiting_notify_interval: Duration,
    /// Lock file liveness timing. The stale threshold must be well below
    /// `max_wait` so a crashed holder is reclaimed before waiters time out.
    pub file_lock: FileLockOptions,
    /// Store contention retry budget.
    pub retry: RetryPolicy,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(300),
            poll_interval: Duration::from_millis(500),
            waiting_notify_interval: Duration::from_secs(10),
            file_lock: FileLockOptions::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// A lock held by this coordinator instance.
#[derive(Debug)]
struct HeldLock {
    session: String,
    handle: FileLockHandle,
}

/// Information about an active lock, for display.
#[derive(Debug, Clone)]
pub struct LockInfo {
    pub record: LockRecord,
    /// Time since the lock file was refreshed; `None` when it is missing.
    pub age: Option<Duration>,
    pub is_stale: bool,
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (session: {}, refreshed: {}{})",
            self.record.key,
            self.record.session,
            match self.age {
                Some(age) => format!("{} ago", format_age(age)),
                None => "never".to_string(),
            },
            if self.is_stale { ", STALE" } else { "" }
        )
    }
}

/// Point-in-time view of every lock and waiter.
#[derive(Debug, Clone)]
pub struct LockSnapshot {
    pub locks: Vec<LockInfo>,
    pub queue: Vec<QueueEntry>,
}

/// Coordinates lock requests from many sessions over one state directory.
pub struct LockCoordinator {
    store: LockStore,
    files: FileLocks,
    options: CoordinatorOptions,
    sink: Box<dyn StatusSink>,
    held: Mutex<HashMap<String, HeldLock>>,
}

impl LockCoordinator {
    /// Assemble a coordinator from its parts.
    pub fn new(
        store: LockStore,
        files: FileLocks,
        options: CoordinatorOptions,
        sink: Box<dyn StatusSink>,
    ) -> Self {
        Self {
            store,
            files,
            options,
            sink,
            held: Mutex::new(HashMap::new()),
        }
    }

    /// Open the store and lock directory of a resolved state directory.
    pub fn open(
        ctx: &StateContext,
        options: CoordinatorOptions,
        sink: Box<dyn StatusSink>,
    ) -> Result<Self> {
        let store = LockStore::open(ctx.store_path(), options.retry)?;
        let files = FileLocks::new(ctx.locks_dir(), options.file_lock);
        Ok(Self::new(store, files, options, sink))
    }

    pub fn options(&self) -> &CoordinatorOptions {
        &self.options
    }

    pub fn store(&self) -> &LockStore {
        &self.store
    }

    /// Acquire the lock for writing `path` (relative paths resolve against
    /// the process working directory).
    pub fn acquire_file_lock<P: AsRef<Path>>(&self, session: &str, path: P) -> Result<()> {
        let cwd = std::env::current_dir().map_err(|e| {
            crate::error::AgentLockError::IoError(format!(
                "failed to get current working directory: {}",
                e
            ))
        })?;
        self.acquire(session, &LockKey::file(path, cwd))
    }

    /// Acquire the lock for mutating the repository containing `working_dir`.
    pub fn acquire_repo_lock<P: AsRef<Path>>(&self, session: &str, working_dir: P) -> Result<()> {
        self.acquire(session, &LockKey::repo(working_dir)?)
    }

    /// Every current lock (with liveness) and every waiter.
    pub fn snapshot(&self) -> Result<LockSnapshot> {
        let locks = self
            .store
            .list_locks()?
            .into_iter()
            .map(|record| {
                let age = self.files.age(&record.lock_file_path);
                let is_stale = self.files.is_stale(&record.lock_file_path);
                LockInfo {
                    record,
                    age,
                    is_stale,
                }
            })
            .collect();
        let queue = self.store.list_queue()?;
        Ok(LockSnapshot { locks, queue })
    }

    /// Whether this instance holds `key` for `session` in its local cache.
    pub fn holds_locally(&self, session: &str, key: &LockKey) -> bool {
        self.held()
            .get(&key.as_string())
            .is_some_and(|held| held.session == session)
    }

    fn held(&self) -> MutexGuard<'_, HashMap<String, HeldLock>> {
        self.held.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Stop refreshing every held lock file without removing anything,
    /// leaving the state a crashed process would leave behind.
    #[cfg(test)]
    pub(crate) fn simulate_crash(self) {
        let held: Vec<HeldLock> = self.held().drain().map(|(_, held)| held).collect();
        for held in held {
            held.handle.abandon();
        }
    }
}
