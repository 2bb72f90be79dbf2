//! Lock file metadata.

use crate::error::{AgentLockError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Metadata written into every lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFileMetadata {
    /// Owner of the lock (e.g., `user@HOST`).
    pub owner: String,

    /// Process ID of the lock holder.
    pub pid: u32,

    /// Unique per acquisition; a holder only ever touches or removes a file
    /// carrying its own token.
    pub token: String,

    /// The lock key this file backs.
    pub key: String,

    /// The file or directory being protected.
    pub target: String,

    /// Timestamp when the lock file was created (RFC3339).
    pub created_at: DateTime<Utc>,
}

impl LockFileMetadata {
    /// Create new lock metadata with the current timestamp and a fresh token.
    pub fn new(key: &str, target: &str) -> Self {
        let pid = std::process::id();
        let created_at = Utc::now();
        let seq = TOKEN_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self {
            owner: get_owner_string(),
            pid,
            token: format!(
                "{}-{}-{}",
                pid,
                created_at.timestamp_nanos_opt().unwrap_or_default(),
                seq
            ),
            key: key.to_string(),
            target: target.to_string(),
            created_at,
        }
    }

    /// Parse lock metadata from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            AgentLockError::IoError(format!(
                "failed to read lock file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            AgentLockError::IoError(format!(
                "failed to parse lock file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    /// Serialize lock metadata to JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            AgentLockError::IoError(format!("failed to serialize lock metadata: {}", e))
        })
    }
}

/// Get the owner string for lock metadata.
pub(crate) fn get_owner_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Format an age as a human-readable string.
pub fn format_age(age: std::time::Duration) -> String {
    let secs = age.as_secs();
    let minutes = secs / 60;
    let hours = minutes / 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs % 60)
    } else {
        format!("{}s", secs)
    }
}
