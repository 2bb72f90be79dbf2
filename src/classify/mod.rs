//! Classifying shell commands by whether they mutate git repository state.
//!
//! A command line is split into simple commands; each git invocation is
//! judged by its subcommand. Anything the structural pass cannot handle
//! falls back to a plain word match on `git`, which over-locks rather than
//! risk two sessions mutating one repository at once.

mod split;

#[cfg(test)]
mod tests;

pub use split::{SplitError, split_commands};

use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// Subcommands that never change repository state.
pub const READ_ONLY_SUBCOMMANDS: &[&str] = &[
    "help",
    "version",
    "status",
    "diff",
    "show",
    "log",
    "reflog",
    "rev-parse",
    "cat-file",
    "ls-files",
    "ls-tree",
    "grep",
    "blame",
    "describe",
];

/// Global options that consume the following token as their value.
const GLOBAL_OPTIONS_WITH_VALUE: &[&str] = &["-c", "-C", "--git-dir", "--work-tree", "--namespace"];

/// `sudo` options that consume the following token as their value.
const SUDO_OPTIONS_WITH_VALUE: &[&str] = &["-u", "-g", "-C", "-D", "-p", "-r", "-t", "-T", "-U", "-R"];

static GIT_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bgit\b").expect("Invalid git word regex"));

/// How a command line affects repository state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    SideEffect,
    ReadOnly,
}

impl Classification {
    pub fn is_side_effect(&self) -> bool {
        matches!(self, Classification::SideEffect)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::SideEffect => write!(f, "side-effect"),
            Classification::ReadOnly => write!(f, "read-only"),
        }
    }
}

/// Classify a raw shell command line.
pub fn classify(command: &str) -> Classification {
    if is_git_side_effect(command) {
        Classification::SideEffect
    } else {
        Classification::ReadOnly
    }
}

/// Whether any git invocation in `command` may change repository state.
pub fn is_git_side_effect(command: &str) -> bool {
    match split_commands(command) {
        Ok(commands) => commands.iter().any(|argv| {
            matches!(git_subcommand(argv), Some(Some(sub)) if !READ_ONLY_SUBCOMMANDS.contains(&sub))
        }),
        Err(e) => {
            let matched = GIT_WORD.is_match(command);
            debug!(error = %e, matched, "structural parse failed; using word match");
            matched
        }
    }
}

/// The subcommand of a git invocation.
///
/// Returns `None` when `argv` is not a git invocation at all, and
/// `Some(None)` for git run without a subcommand (`git --version`).
fn git_subcommand(argv: &[String]) -> Option<Option<&str>> {
    let mut rest = command_words(argv).iter().map(String::as_str);

    let program = rest.next()?;
    if Path::new(program).file_name().and_then(|name| name.to_str()) != Some("git") {
        return None;
    }

    while let Some(token) = rest.next() {
        if GLOBAL_OPTIONS_WITH_VALUE.contains(&token) {
            rest.next();
        } else if !token.starts_with('-') {
            return Some(Some(token));
        }
    }
    Some(None)
}

/// `argv` without its `sudo` wrappers (and their options) and `NAME=value`
/// prefix assignments.
fn command_words(argv: &[String]) -> &[String] {
    let mut start = 0;
    let mut in_sudo = false;
    while let Some(token) = argv.get(start).map(String::as_str) {
        if token == "sudo" {
            in_sudo = true;
            start += 1;
        } else if in_sudo && token == "--" {
            in_sudo = false;
            start += 1;
        } else if in_sudo && SUDO_OPTIONS_WITH_VALUE.contains(&token) {
            start += 2;
        } else if in_sudo && token.starts_with('-') {
            start += 1;
        } else if is_env_assignment(token) {
            start += 1;
        } else {
            break;
        }
    }
    argv.get(start..).unwrap_or_default()
}

/// `NAME=value` prefix assignment.
fn is_env_assignment(token: &str) -> bool {
    match token.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && !name.starts_with(|c: char| c.is_ascii_digit())
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}
