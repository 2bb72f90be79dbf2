//! Lock keys: the identity of a mutually-exclusive resource.
//!
//! A key is either `file:<absolute-path>` or `repo:<resolved-directory>`.
//! File paths are normalized lexically so that `a/./b.ts` and `a/b.ts`
//! collide; repository directories resolve to the git top-level so that every
//! subdirectory of a checkout shares one repo lock.

use crate::error::{AgentLockError, Result};
use crate::git;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Scope of a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    /// A single file write.
    File,
    /// A state-changing git command against a repository.
    Repo,
}

impl LockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockKind::File => "file",
            LockKind::Repo => "repo",
        }
    }

    /// Parse a lock kind from its stored form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "file" => Some(Self::File),
            "repo" => Some(Self::Repo),
            _ => None,
        }
    }
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A derived lock key together with the target it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockKey {
    kind: LockKind,
    target: PathBuf,
}

impl LockKey {
    /// Key for writing `path`, resolved against `cwd` when relative.
    pub fn file<P: AsRef<Path>, C: AsRef<Path>>(path: P, cwd: C) -> Self {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            cwd.as_ref().join(path)
        };
        Self {
            kind: LockKind::File,
            target: normalize_path(&absolute),
        }
    }

    /// Key for mutating the repository containing `working_dir`.
    ///
    /// Falls back to the canonical directory itself when it is not inside a
    /// git repository (git may still be invoked with `-C` or `--git-dir`).
    pub fn repo<P: AsRef<Path>>(working_dir: P) -> Result<Self> {
        let dir = working_dir.as_ref();
        let canonical = dir.canonicalize().map_err(|e| {
            AgentLockError::UserError(format!(
                "failed to resolve working directory '{}': {}",
                dir.display(),
                e
            ))
        })?;

        let target = match git::get_repo_root(&canonical) {
            Ok(root) => root.canonicalize().unwrap_or(root),
            Err(_) => canonical,
        };

        Ok(Self {
            kind: LockKind::Repo,
            target,
        })
    }

    pub fn kind(&self) -> LockKind {
        self.kind
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// The durable string form stored in the lock and queue tables.
    pub fn as_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.target.display())
    }
}

/// Remove `.` and `..` components without touching the filesystem.
///
/// `..` above the root is dropped, matching how the kernel resolves `/..`.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}
