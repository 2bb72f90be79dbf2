//! State directory resolution for agentlock.
//!
//! Every session working in one checkout must agree on a single state
//! directory, or they would coordinate through different stores. The
//! directory is resolved, in order, from:
//!
//! 1. `AGENTLOCK_STATE_DIR` (relative values resolve against the cwd)
//! 2. `<git common dir>/agentlock`, shared by every worktree of a repository
//! 3. `<cwd>/.agentlock` outside of git

use crate::error::{AgentLockError, Result};
use crate::git;
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable overriding the state directory.
pub const STATE_DIR_ENV: &str = "AGENTLOCK_STATE_DIR";

/// State directory name inside the git common directory.
pub const GIT_STATE_DIR: &str = "agentlock";

/// State directory name outside of git.
pub const FALLBACK_STATE_DIR: &str = ".agentlock";

/// File name of the lock store inside the state directory.
pub const STORE_FILE: &str = "locks.db";

/// Directory of advisory lock files inside the state directory.
pub const LOCKS_DIR: &str = "locks";

/// Resolved paths for one agentlock state directory. All paths are absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateContext {
    /// Directory the state was resolved from.
    pub cwd: PathBuf,

    /// Absolute path to the state directory.
    pub state_dir: PathBuf,
}

impl StateContext {
    /// Resolve the state directory from the environment and current directory.
    pub fn resolve() -> Result<Self> {
        let cwd = env::current_dir().map_err(|e| {
            AgentLockError::UserError(format!("failed to get current working directory: {}", e))
        })?;
        let override_dir = env::var_os(STATE_DIR_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        Ok(Self::resolve_from(cwd, override_dir))
    }

    /// Resolve from an explicit directory and optional override.
    pub fn resolve_from<P: AsRef<Path>>(cwd: P, override_dir: Option<PathBuf>) -> Self {
        let cwd = cwd.as_ref().to_path_buf();

        let state_dir = match override_dir {
            Some(dir) if dir.is_absolute() => dir,
            Some(dir) => cwd.join(dir),
            None => match git::get_common_dir(&cwd) {
                Ok(common) => common.join(GIT_STATE_DIR),
                Err(_) => cwd.join(FALLBACK_STATE_DIR),
            },
        };

        Self { cwd, state_dir }
    }

    /// Get the path to the config file.
    pub fn config_path(&self) -> PathBuf {
        self.state_dir.join("config.yaml")
    }

    /// Get the path to the lock store database.
    pub fn store_path(&self) -> PathBuf {
        self.state_dir.join(STORE_FILE)
    }

    /// Get the path to the lock files directory.
    pub fn locks_dir(&self) -> PathBuf {
        self.state_dir.join(LOCKS_DIR)
    }

    /// Get the path to the NDJSON status log.
    pub fn events_file(&self) -> PathBuf {
        self.state_dir.join("events.ndjson")
    }
}
