//! Host event adapter.
//!
//! Translates the host's tool and session lifecycle events into coordinator
//! calls: mutating tools acquire the locks they need before running, and an
//! idle or deleted session releases everything it holds.

use crate::classify::is_git_side_effect;
use crate::coordinator::LockCoordinator;
use crate::error::{AgentLockError, Result};
use crate::key::LockKey;
use crate::patch::resolve_patch_paths;
use globset::GlobSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An event delivered by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    /// A tool is about to run.
    ToolBefore {
        #[serde(alias = "sessionID", alias = "sessionId")]
        session_id: String,
        tool: String,
        #[serde(default)]
        args: Value,
    },
    SessionIdle {
        #[serde(alias = "sessionID", alias = "sessionId")]
        session_id: String,
    },
    SessionDeleted {
        #[serde(alias = "sessionID", alias = "sessionId")]
        session_id: String,
    },
}

impl HostEvent {
    pub fn session_id(&self) -> &str {
        match self {
            HostEvent::ToolBefore { session_id, .. }
            | HostEvent::SessionIdle { session_id }
            | HostEvent::SessionDeleted { session_id } => session_id,
        }
    }
}

/// What handling an event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// The listed keys are now held (empty when the tool needs no lock).
    Locked(Vec<String>),
    /// The session's locks were released.
    Released(usize),
}

/// Maps tool invocations to lock keys.
#[derive(Debug, Clone)]
pub struct Hook {
    cwd: PathBuf,
    exempt: GlobSet,
}

impl Hook {
    /// `cwd` resolves relative paths in tool arguments; paths matching
    /// `exempt` never take a file lock.
    pub fn new<P: Into<PathBuf>>(cwd: P, exempt: GlobSet) -> Self {
        Self {
            cwd: cwd.into(),
            exempt,
        }
    }

    /// Keys `tool` needs before it may run, in acquisition order.
    ///
    /// Several keys are always returned sorted so that concurrent sessions
    /// requesting overlapping sets cannot deadlock each other.
    pub fn plan(&self, tool: &str, args: &Value) -> Result<Vec<LockKey>> {
        let keys = match tool.to_ascii_lowercase().as_str() {
            "write" | "edit" | "multiedit" => {
                let path = string_arg(args, &["file_path", "filePath", "path"]).ok_or_else(|| {
                    AgentLockError::UserError(format!("tool '{}' has no file path argument", tool))
                })?;
                self.file_keys([PathBuf::from(path)])
            }
            "bash" => {
                let command = string_arg(args, &["command", "cmd"]).unwrap_or_default();
                if is_git_side_effect(command) {
                    let workdir = self.workdir(args);
                    vec![LockKey::repo(workdir)?]
                } else {
                    Vec::new()
                }
            }
            "apply_patch" | "patch" => {
                let text = string_arg(args, &["patchText", "patch_text", "patch", "input"])
                    .unwrap_or_default();
                self.file_keys(resolve_patch_paths(text, self.workdir(args)))
            }
            _ => Vec::new(),
        };
        debug!(tool, keys = keys.len(), "planned locks");
        Ok(keys)
    }

    /// Apply `event` to `coordinator`, blocking until every needed lock is held.
    ///
    /// If a later key times out, keys acquired earlier for the same event
    /// stay held until the session is released.
    pub fn handle(&self, coordinator: &LockCoordinator, event: &HostEvent) -> Result<HookOutcome> {
        match event {
            HostEvent::ToolBefore {
                session_id,
                tool,
                args,
            } => {
                let keys = self.plan(tool, args)?;
                for key in &keys {
                    coordinator.acquire(session_id, key)?;
                }
                Ok(HookOutcome::Locked(keys.iter().map(LockKey::as_string).collect()))
            }
            HostEvent::SessionIdle { session_id } | HostEvent::SessionDeleted { session_id } => {
                Ok(HookOutcome::Released(coordinator.release_session(session_id)?))
            }
        }
    }

    fn file_keys<I: IntoIterator<Item = PathBuf>>(&self, paths: I) -> Vec<LockKey> {
        let mut keys: Vec<LockKey> = paths
            .into_iter()
            .map(|path| LockKey::file(path, &self.cwd))
            .filter(|key| !self.is_exempt(key.target()))
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    fn is_exempt(&self, path: &Path) -> bool {
        if self.exempt.is_empty() {
            return false;
        }
        self.exempt.is_match(path)
            || path
                .strip_prefix(&self.cwd)
                .is_ok_and(|relative| self.exempt.is_match(relative))
    }

    fn workdir(&self, args: &Value) -> PathBuf {
        match string_arg(args, &["workdir", "cwd"]) {
            Some(dir) => self.cwd.join(dir),
            None => self.cwd.clone(),
        }
    }
}

/// First non-empty string among `names` in the argument object.
fn string_arg<'a>(args: &'a Value, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| args.get(name).and_then(Value::as_str))
        .find(|value| !value.is_empty())
}
