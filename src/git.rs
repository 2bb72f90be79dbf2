//! Git command runner for agentlock.
//!
//! Only used for path resolution: the repository top-level backing a
//! `repo:` lock key, and the git common directory that hosts the shared
//! state directory. All git calls go through this module.

use crate::error::{AgentLockError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Result of a successful git command execution.
#[derive(Debug, Clone)]
pub struct GitOutput {
    /// Standard output from the command (trimmed).
    pub stdout: String,
    /// Standard error from the command (trimmed).
    pub stderr: String,
}

impl GitOutput {
    fn from_output(output: &Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }
}

/// Run a git command with the specified working directory.
///
/// # Returns
///
/// * `Ok(GitOutput)` - On successful execution (exit code 0)
/// * `Err(AgentLockError::GitError)` - On spawn failure or non-zero exit code
pub fn run_git<P: AsRef<Path>>(cwd: P, args: &[&str]) -> Result<GitOutput> {
    let cwd = cwd.as_ref();

    let output = Command::new("git")
        .current_dir(cwd)
        .args(args)
        .output()
        .map_err(|e| {
            AgentLockError::GitError(format!(
                "failed to execute git {}: {}",
                args.first().unwrap_or(&""),
                e
            ))
        })?;

    let git_output = GitOutput::from_output(&output);

    if output.status.success() {
        Ok(git_output)
    } else {
        let exit_code = output.status.code().unwrap_or(-1);
        let error_msg = if git_output.stderr.is_empty() {
            git_output.stdout.clone()
        } else {
            git_output.stderr.clone()
        };

        Err(AgentLockError::GitError(format!(
            "git {} failed (exit code {}): {}",
            args.first().unwrap_or(&""),
            exit_code,
            error_msg
        )))
    }
}

/// Get the repository root directory using `git rev-parse --show-toplevel`.
///
/// Works from any directory inside the repository, including linked worktrees
/// (which report their own top-level).
pub fn get_repo_root<P: AsRef<Path>>(cwd: P) -> Result<PathBuf> {
    let output = run_git(cwd, &["rev-parse", "--show-toplevel"])?;
    Ok(PathBuf::from(&output.stdout))
}

/// Get the git common directory (shared by all worktrees of a repository).
///
/// The path is made absolute against `cwd` since git may report it relative.
pub fn get_common_dir<P: AsRef<Path>>(cwd: P) -> Result<PathBuf> {
    let cwd = cwd.as_ref();
    let output = run_git(cwd, &["rev-parse", "--git-common-dir"])?;
    let path = PathBuf::from(&output.stdout);
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(cwd.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::create_test_repo;
    use tempfile::TempDir;

    #[test]
    fn test_run_git_success() {
        let temp_dir = create_test_repo();
        let output = run_git(temp_dir.path(), &["status", "--porcelain"]).unwrap();
        assert!(output.stdout.is_empty());
    }

    #[test]
    fn test_run_git_failure_is_git_error() {
        let temp_dir = create_test_repo();
        let err = run_git(temp_dir.path(), &["checkout", "does-not-exist"]).unwrap_err();
        assert!(matches!(err, AgentLockError::GitError(_)));
        assert!(err.to_string().contains("git checkout failed"));
    }

    #[test]
    fn test_get_repo_root_from_subdirectory() {
        let temp_dir = create_test_repo();
        let sub = temp_dir.path().join("nested").join("dir");
        std::fs::create_dir_all(&sub).unwrap();

        let root = get_repo_root(&sub).unwrap();
        assert_eq!(
            root.canonicalize().unwrap(),
            temp_dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_get_repo_root_outside_repo_fails() {
        let temp_dir = TempDir::new().unwrap();
        assert!(get_repo_root(temp_dir.path()).is_err());
    }

    #[test]
    fn test_get_common_dir_is_absolute() {
        let temp_dir = create_test_repo();
        let common = get_common_dir(temp_dir.path()).unwrap();
        assert!(common.is_absolute());
        assert!(common.ends_with(".git"));
    }
}
