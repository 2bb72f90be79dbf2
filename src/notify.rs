//! Lock status notifications.
//!
//! The coordinator reports every phase change of a lock request to a
//! [`StatusSink`]. Sinks are best-effort: a failing sink is logged and
//! otherwise ignored, and can never change a locking decision.
//!
//! # Sinks
//!
//! - [`TracingSink`]: one structured `tracing` event per status
//! - [`NdjsonSink`]: appends one JSON object per line to `events.ndjson`
//! - [`FanoutSink`]: forwards to several sinks

use crate::error::{AgentLockError, Result};
use crate::key::LockKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Phases a lock request moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// The request entered the wait queue.
    Queued,
    /// The request is blocked behind other waiters or a live holder.
    Waiting,
    /// The lock is held by the requesting session.
    Acquired,
    /// A session released its locks.
    Released,
    /// A dead holder's lock was reclaimed.
    StaleReaped,
    /// The request gave up after the max wait.
    Timeout,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Queued => write!(f, "queued"),
            Phase::Waiting => write!(f, "waiting"),
            Phase::Acquired => write!(f, "acquired"),
            Phase::Released => write!(f, "released"),
            Phase::StaleReaped => write!(f, "stale_reaped"),
            Phase::Timeout => write!(f, "timeout"),
        }
    }
}

/// One status notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockStatus {
    pub ts: DateTime<Utc>,
    pub phase: Phase,
    pub session_id: String,

    /// Absent for `released`, which spans every key of the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<LockKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released_count: Option<usize>,
}

impl LockStatus {
    /// A status for one lock key.
    pub fn for_key(phase: Phase, session_id: &str, kind: LockKind, key: &str, target: &str) -> Self {
        Self {
            ts: Utc::now(),
            phase,
            session_id: session_id.to_string(),
            kind: Some(kind),
            key: Some(key.to_string()),
            target: Some(target.to_string()),
            queue_position: None,
            queue_length: None,
            owner_session: None,
            wait_ms: None,
            released_count: None,
        }
    }

    /// The `released` status for a whole session.
    pub fn released(session_id: &str, released_count: usize) -> Self {
        Self {
            ts: Utc::now(),
            phase: Phase::Released,
            session_id: session_id.to_string(),
            kind: None,
            key: None,
            target: None,
            queue_position: None,
            queue_length: None,
            owner_session: None,
            wait_ms: None,
            released_count: Some(released_count),
        }
    }

    pub fn with_queue(mut self, position: Option<u64>, length: u64) -> Self {
        self.queue_position = position;
        self.queue_length = Some(length);
        self
    }

    pub fn with_owner(mut self, owner: Option<String>) -> Self {
        self.owner_session = owner;
        self
    }

    pub fn with_wait_ms(mut self, wait_ms: u64) -> Self {
        self.wait_ms = Some(wait_ms);
        self
    }

    /// Serialize the status to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            AgentLockError::IoError(format!("failed to serialize status to JSON: {}", e))
        })
    }
}

/// Receiver of lock status notifications.
pub trait StatusSink: Send + Sync {
    fn notify(&self, status: &LockStatus) -> Result<()>;
}

/// Deliver `status`, swallowing sink failures.
pub fn emit(sink: &dyn StatusSink, status: &LockStatus) {
    if let Err(e) = sink.notify(status) {
        debug!(phase = %status.phase, error = %e, "status notification dropped");
    }
}

/// Logs each notification as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn notify(&self, status: &LockStatus) -> Result<()> {
        info!(
            phase = %status.phase,
            session = %status.session_id,
            key = status.key.as_deref().unwrap_or(""),
            position = status.queue_position,
            length = status.queue_length,
            owner = status.owner_session.as_deref(),
            wait_ms = status.wait_ms,
            released = status.released_count,
            "lock status"
        );
        Ok(())
    }
}

/// Appends notifications to an NDJSON audit log.
///
/// Each append is one `write` of a full line to a file opened in append mode,
/// so lines from concurrent processes never interleave mid-line.
#[derive(Debug)]
pub struct NdjsonSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl NdjsonSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatusSink for NdjsonSink {
    fn notify(&self, status: &LockStatus) -> Result<()> {
        let mut line = status.to_ndjson_line()?;
        line.push('\n');

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());

        if let Some(parent) = self.path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                AgentLockError::IoError(format!(
                    "failed to create events directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                AgentLockError::IoError(format!(
                    "failed to open events file '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;

        file.write_all(line.as_bytes()).map_err(|e| {
            AgentLockError::IoError(format!(
                "failed to write event to '{}': {}",
                self.path.display(),
                e
            ))
        })
    }
}

/// Forwards every notification to each inner sink.
///
/// One failing sink does not stop delivery to the others; the first error is
/// reported.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn StatusSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Box<dyn StatusSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl StatusSink for FanoutSink {
    fn notify(&self, status: &LockStatus) -> Result<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.notify(status)
                && first_err.is_none()
            {
                first_err = Some(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
