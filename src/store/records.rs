//! Row types for the lock and queue tables.

use crate::key::LockKind;
use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use serde::Serialize;
use std::path::PathBuf;

/// The current holder of a lock key. At most one per key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockRecord {
    pub key: String,
    pub session: String,
    pub kind: LockKind,
    pub target: String,
    /// Advisory lock file backing this record (liveness signal).
    pub lock_file_path: PathBuf,
    pub acquired_at: DateTime<Utc>,
}

/// A waiter for a lock key. Ticket order is acquisition order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueEntry {
    pub ticket: i64,
    pub key: String,
    pub session: String,
    pub kind: LockKind,
    pub target: String,
    pub enqueued_at: DateTime<Utc>,
}

/// Where a ticket stands among the waiters for its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePosition {
    /// 1-based rank of the ticket; `None` once the ticket has been removed.
    pub position: Option<u64>,
    /// Total waiters for the key.
    pub length: u64,
    /// Session owning the lowest ticket for the key.
    pub head_session: Option<String>,
}

impl QueuePosition {
    pub fn is_head(&self) -> bool {
        self.position == Some(1)
    }
}

fn kind_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<LockKind> {
    let raw: String = row.get(idx)?;
    LockKind::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown lock kind '{}'", raw).into(),
        )
    })
}

impl LockRecord {
    /// Map a `key, session, kind, target, lock_file_path, created_at` row.
    pub(super) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let lock_file_path: String = row.get(4)?;
        Ok(Self {
            key: row.get(0)?,
            session: row.get(1)?,
            kind: kind_from_row(row, 2)?,
            target: row.get(3)?,
            lock_file_path: PathBuf::from(lock_file_path),
            acquired_at: row.get(5)?,
        })
    }
}

impl QueueEntry {
    /// Map a `ticket, key, session, kind, target, created_at` row.
    pub(super) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            ticket: row.get(0)?,
            key: row.get(1)?,
            session: row.get(2)?,
            kind: kind_from_row(row, 3)?,
            target: row.get(4)?,
            enqueued_at: row.get(5)?,
        })
    }
}
