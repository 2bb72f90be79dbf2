//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for the lock coordinator.
///
/// This struct represents the contents of `<state>/config.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Waiting
    // =========================================================================
    /// Longest a waiter stays queued before failing with a lock timeout.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,

    /// Sleep between polls of the queue and lock table.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Minimum spacing of repeated `waiting` notifications with unchanged state.
    #[serde(default = "default_waiting_notify_interval_ms")]
    pub waiting_notify_interval_ms: u64,

    // =========================================================================
    // Liveness
    // =========================================================================
    /// Lock files whose mtime is older than this are considered abandoned.
    #[serde(default = "default_stale_ms")]
    pub stale_ms: u64,

    /// How often a holder touches its lock file.
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,

    // =========================================================================
    // Store
    // =========================================================================
    /// Attempts for a store operation hitting `SQLITE_BUSY` before giving up.
    #[serde(default = "default_store_retry_attempts")]
    pub store_retry_attempts: u32,

    /// First backoff delay; doubled after each contended attempt.
    #[serde(default = "default_store_retry_base_ms")]
    pub store_retry_base_ms: u64,

    // =========================================================================
    // Hook adapter
    // =========================================================================
    /// Append status notifications to `<state>/events.ndjson`.
    #[serde(default = "default_true")]
    pub event_log: bool,

    /// Glob patterns of paths that never take a file lock (scratch files etc).
    #[serde(default)]
    pub exempt_globs: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_wait_ms: default_max_wait_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            waiting_notify_interval_ms: default_waiting_notify_interval_ms(),
            stale_ms: default_stale_ms(),
            refresh_ms: default_refresh_ms(),
            store_retry_attempts: default_store_retry_attempts(),
            store_retry_base_ms: default_store_retry_base_ms(),
            event_log: default_true(),
            exempt_globs: Vec::new(),
        }
    }
}
