//! Exit code constants for the agentlock CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config, invalid state)
//! - 2: Lock timeout (the mutating action must not proceed)
//! - 3: Lock store failure
//! - 4: Git operation failure

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid config, or unusable state directory.
pub const USER_ERROR: i32 = 1;

/// A lock could not be acquired within the configured max wait.
pub const LOCK_TIMEOUT: i32 = 2;

/// The durable lock store failed (including exhausted contention retries).
pub const STORE_FAILURE: i32 = 3;

/// Git operation failure while resolving a repository.
pub const GIT_FAILURE: i32 = 4;
