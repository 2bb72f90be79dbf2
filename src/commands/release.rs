//! Implementation of the `agentlock release` command.

use super::open_coordinator;
use crate::cli::ReleaseArgs;
use crate::error::{AgentLockError, Result};

/// Execute the `agentlock release` command.
///
/// Releases every lock and queue entry of the session, whichever process
/// acquired them. Useful when a host died without sending an idle event.
pub fn cmd_release(args: ReleaseArgs) -> Result<()> {
    let session = args.session.trim();
    if session.is_empty() {
        return Err(AgentLockError::UserError(
            "session ID cannot be empty".to_string(),
        ));
    }

    let (_, _, coordinator) = open_coordinator()?;
    let count = coordinator.release_session(session)?;

    println!("Released {} lock(s) held by session {}", count, session);
    Ok(())
}
