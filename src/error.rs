//! Error types for agentlock.
//!
//! Uses thiserror for derive macros. Only `LockTimeout` is an actionable
//! failure for a waiting session; the other variants indicate a broken
//! environment (bad config, unreadable state directory, failing store).

use crate::exit_codes;
use thiserror::Error;

/// Main error type for agentlock operations.
#[derive(Error, Debug)]
pub enum AgentLockError {
    /// User provided invalid arguments or the system is in an invalid state.
    #[error("{0}")]
    UserError(String),

    /// Configuration could not be loaded or failed validation.
    #[error("config validation failed: {0}")]
    ConfigError(String),

    /// The lock store failed (or stayed contended past the retry budget).
    #[error("lock store error: {0}")]
    StoreError(String),

    /// Filesystem operation on the state directory failed.
    #[error("{0}")]
    IoError(String),

    /// Git operation failed.
    #[error("Git operation failed: {0}")]
    GitError(String),

    /// The waiter exceeded the configured max wait for a lock key.
    #[error("timed out after {waited_ms}ms waiting for lock '{key}'")]
    LockTimeout { key: String, waited_ms: u64 },
}

impl AgentLockError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            AgentLockError::UserError(_) => exit_codes::USER_ERROR,
            AgentLockError::ConfigError(_) => exit_codes::USER_ERROR,
            AgentLockError::IoError(_) => exit_codes::USER_ERROR,
            AgentLockError::StoreError(_) => exit_codes::STORE_FAILURE,
            AgentLockError::GitError(_) => exit_codes::GIT_FAILURE,
            AgentLockError::LockTimeout { .. } => exit_codes::LOCK_TIMEOUT,
        }
    }

    /// Whether this error is the waiter-facing timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AgentLockError::LockTimeout { .. })
    }
}

impl From<rusqlite::Error> for AgentLockError {
    fn from(e: rusqlite::Error) -> Self {
        AgentLockError::StoreError(e.to_string())
    }
}

/// Result type alias for agentlock operations.
pub type Result<T> = std::result::Result<T, AgentLockError>;
