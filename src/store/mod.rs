//! Durable lock table and FIFO wait queue.
//!
//! Both tables live in one SQLite database shared by every process that
//! coordinates on the same state directory. SQLite serializes writers; a
//! writer that collides with another process sees `SQLITE_BUSY`, which is
//! retried with bounded exponential backoff (see [`retry`]).
//!
//! # Tables
//!
//! - `locks`: `key` (primary) -> holding session, kind, target, lock file path
//! - `queue`: `ticket` (autoincrement, never reused) -> waiting session per key
//!
//! The lock row is the authority on ownership. Queue rows only order waiters.

mod records;
mod retry;
mod schema;


pub use records::{LockRecord, QueueEntry, QueuePosition};
pub use retry::RetryPolicy;

use crate::error::{AgentLockError, Result};
use crate::key::LockKind;
use chrono::Utc;
use retry::with_retry;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// How long SQLite itself blocks on a locked database before reporting busy.
const BUSY_TIMEOUT: Duration = Duration::from_millis(50);

/// Handle to the lock and queue tables.
#[derive(Debug)]
pub struct LockStore {
    conn: Mutex<Connection>,
    retry: RetryPolicy,
}

impl LockStore {
    /// Open (creating if needed) the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P, retry: RetryPolicy) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                AgentLockError::IoError(format!(
                    "failed to create state directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            AgentLockError::StoreError(format!(
                "failed to open lock store '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::init(conn, retry)
    }

    /// Open a private in-memory store (single process only).
    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, RetryPolicy::default())
    }

    fn init(conn: Connection, retry: RetryPolicy) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;

        // Switching to WAL needs a brief exclusive lock; another process doing
        // the same at the same instant is ordinary contention.
        with_retry(retry, "enable WAL", || {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })
        })?;
        with_retry(retry, "create schema", || conn.execute_batch(schema::SCHEMA))?;

        Ok(Self {
            conn: Mutex::new(conn),
            retry,
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    // =========================================================================
    // Lock table
    // =========================================================================

    /// Insert the lock row for `record.key`.
    ///
    /// Returns `false` without modifying anything when the key is already held.
    pub fn insert_lock(&self, record: &LockRecord) -> Result<bool> {
        let conn = self.conn();
        let lock_file = record.lock_file_path.to_string_lossy().to_string();
        let inserted = with_retry(self.retry, "insert lock", || {
            conn.execute(
                "INSERT INTO locks (key, session, kind, target, lock_file_path, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(key) DO NOTHING",
                params![
                    record.key,
                    record.session,
                    record.kind.as_str(),
                    record.target,
                    lock_file,
                    record.acquired_at,
                ],
            )
        })?;
        Ok(inserted == 1)
    }

    /// Read the current holder of `key`.
    pub fn get_lock(&self, key: &str) -> Result<Option<LockRecord>> {
        let conn = self.conn();
        with_retry(self.retry, "read lock", || {
            conn.query_row(
                "SELECT key, session, kind, target, lock_file_path, created_at
                 FROM locks WHERE key = ?1",
                params![key],
                LockRecord::from_row,
            )
            .optional()
        })
    }

    /// Delete the lock row for `key` only if `session` still holds it.
    ///
    /// Used when reclaiming a stale lock so that a holder change between the
    /// read and the delete is never clobbered.
    pub fn delete_lock_if_held_by(&self, key: &str, session: &str) -> Result<bool> {
        let conn = self.conn();
        let deleted = with_retry(self.retry, "delete stale lock", || {
            conn.execute(
                "DELETE FROM locks WHERE key = ?1 AND session = ?2",
                params![key, session],
            )
        })?;
        Ok(deleted > 0)
    }

    /// Delete every lock row owned by `session`, returning the deleted rows.
    pub fn delete_locks_for_session(&self, session: &str) -> Result<Vec<LockRecord>> {
        let mut conn = self.conn();
        with_retry(self.retry, "release session locks", || {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let records = {
                let mut stmt = tx.prepare(
                    "SELECT key, session, kind, target, lock_file_path, created_at
                     FROM locks WHERE session = ?1 ORDER BY key",
                )?;
                stmt.query_map(params![session], LockRecord::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            };
            tx.execute("DELETE FROM locks WHERE session = ?1", params![session])?;
            tx.commit()?;
            Ok(records)
        })
    }

    /// All current lock rows, ordered by key.
    pub fn list_locks(&self) -> Result<Vec<LockRecord>> {
        let conn = self.conn();
        with_retry(self.retry, "list locks", || {
            let mut stmt = conn.prepare(
                "SELECT key, session, kind, target, lock_file_path, created_at
                 FROM locks ORDER BY key",
            )?;
            stmt.query_map([], LockRecord::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()
        })
    }

    // =========================================================================
    // Queue table
    // =========================================================================

    /// Append a waiter for `key` and return its ticket.
    pub fn enqueue(&self, key: &str, session: &str, kind: LockKind, target: &str) -> Result<i64> {
        let conn = self.conn();
        let now = Utc::now();
        let ticket = with_retry(self.retry, "enqueue", || {
            conn.execute(
                "INSERT INTO queue (key, session, kind, target, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![key, session, kind.as_str(), target, now],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        debug!(key, session, ticket, "enqueued");
        Ok(ticket)
    }

    /// Remove one waiter. Returns whether the ticket existed.
    pub fn dequeue(&self, ticket: i64) -> Result<bool> {
        let conn = self.conn();
        let deleted = with_retry(self.retry, "dequeue", || {
            conn.execute("DELETE FROM queue WHERE ticket = ?1", params![ticket])
        })?;
        Ok(deleted > 0)
    }

    /// Remove every waiter owned by `session`. Returns the number removed.
    pub fn dequeue_session(&self, session: &str) -> Result<usize> {
        let conn = self.conn();
        with_retry(self.retry, "dequeue session", || {
            conn.execute("DELETE FROM queue WHERE session = ?1", params![session])
        })
    }

    /// Rank of `ticket` among the waiters for `key`, plus queue length and head.
    ///
    /// Computed in one read transaction so the three values are consistent.
    pub fn queue_position(&self, key: &str, ticket: i64) -> Result<QueuePosition> {
        let mut conn = self.conn();
        with_retry(self.retry, "queue position", || {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
            let length: i64 = tx.query_row(
                "SELECT COUNT(*) FROM queue WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )?;
            let present: i64 = tx.query_row(
                "SELECT COUNT(*) FROM queue WHERE ticket = ?1 AND key = ?2",
                params![ticket, key],
                |row| row.get(0),
            )?;
            let rank: i64 = tx.query_row(
                "SELECT COUNT(*) FROM queue WHERE key = ?1 AND ticket <= ?2",
                params![key, ticket],
                |row| row.get(0),
            )?;
            let head_session: Option<String> = tx
                .query_row(
                    "SELECT session FROM queue WHERE key = ?1 ORDER BY ticket ASC LIMIT 1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            tx.commit()?;

            Ok(QueuePosition {
                position: (present > 0).then_some(rank as u64),
                length: length as u64,
                head_session,
            })
        })
    }

    /// All waiters, ordered by key then ticket.
    pub fn list_queue(&self) -> Result<Vec<QueueEntry>> {
        let conn = self.conn();
        with_retry(self.retry, "list queue", || {
            let mut stmt = conn.prepare(
                "SELECT ticket, key, session, kind, target, created_at
                 FROM queue ORDER BY key, ticket",
            )?;
            stmt.query_map([], QueueEntry::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()
        })
    }
}
