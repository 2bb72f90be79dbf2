//! Bounded exponential backoff for contended writes.
//!
//! Several processes share one SQLite file. A writer that finds the database
//! locked gets `SQLITE_BUSY`/`SQLITE_LOCKED`; that is transient and retried
//! here. Any other error is returned on the first attempt.

use crate::error::{AgentLockError, Result};
use rusqlite::ErrorCode;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Retry budget for store operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay after the first contended attempt; doubled each time.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 8,
            base_delay: Duration::from_millis(20),
        }
    }
}

const MAX_DELAY: Duration = Duration::from_secs(1);

/// Whether a SQLite error is write contention rather than a real failure.
pub(crate) fn is_contention(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::DatabaseBusy || e.code == ErrorCode::DatabaseLocked
    )
}

/// Run `op` until it succeeds, fails with a non-contention error, or the
/// budget runs out.
pub(crate) fn with_retry<T, F>(policy: RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> rusqlite::Result<T>,
{
    let mut delay = policy.base_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if is_contention(&e) && attempt < policy.attempts => {
                debug!(
                    operation = what,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "store contended, backing off"
                );
                thread::sleep(delay);
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(e) if is_contention(&e) => {
                return Err(AgentLockError::StoreError(format!(
                    "{} still contended after {} attempts: {}",
                    what, attempt, e
                )));
            }
            Err(e) => {
                return Err(AgentLockError::StoreError(format!("{} failed: {}", what, e)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;

    fn busy() -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(ffi::SQLITE_BUSY), None)
    }

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_busy_is_contention() {
        assert!(is_contention(&busy()));
        assert!(is_contention(&rusqlite::Error::SqliteFailure(
            ffi::Error::new(ffi::SQLITE_LOCKED),
            None
        )));
        assert!(!is_contention(&rusqlite::Error::QueryReturnedNoRows));
    }

    #[test]
    fn test_retry_recovers_from_transient_contention() {
        let mut calls = 0;
        let result = with_retry(fast_policy(5), "insert", || {
            calls += 1;
            if calls < 3 { Err(busy()) } else { Ok(calls) }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_retry_gives_up_after_budget() {
        let mut calls = 0;
        let result: Result<()> = with_retry(fast_policy(3), "insert", || {
            calls += 1;
            Err(busy())
        });
        assert_eq!(calls, 3);
        let err = result.unwrap_err();
        assert!(matches!(err, AgentLockError::StoreError(_)));
        assert!(err.to_string().contains("still contended after 3 attempts"));
    }

    #[test]
    fn test_non_contention_error_is_not_retried() {
        let mut calls = 0;
        let result: Result<()> = with_retry(fast_policy(5), "select", || {
            calls += 1;
            Err(rusqlite::Error::QueryReturnedNoRows)
        });
        assert_eq!(calls, 1);
        assert!(result.is_err());
    }
}
