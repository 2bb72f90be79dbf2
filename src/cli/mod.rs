//! CLI argument parsing for agentlock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Agentlock: cross-process lock coordinator for concurrent agent sessions.
///
/// Sessions sharing one working tree take per-file locks before writing and
/// a per-repository lock before state-changing git commands. Waiters are
/// served first come, first served; crashed holders are reclaimed.
#[derive(Parser, Debug)]
#[command(name = "agentlock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for agentlock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve host events from stdin.
    ///
    /// Reads one JSON event per line and answers each with one JSON line on
    /// stdout once its locks are held (or released).
    Hook,

    /// Release every lock and pending wait of a session.
    Release(ReleaseArgs),

    /// Show current locks and queued waiters.
    Status,

    /// Classify a shell command as `side-effect` or `read-only`.
    Classify(ClassifyArgs),

    /// Print the paths touched by a patch read from stdin.
    PatchPaths(PatchPathsArgs),
}

/// Arguments for the `release` command.
#[derive(Parser, Debug)]
pub struct ReleaseArgs {
    /// Session ID whose locks to release
    pub session: String,
}

/// Arguments for the `classify` command.
#[derive(Parser, Debug)]
pub struct ClassifyArgs {
    /// Shell command line (quote it as one argument)
    pub command: String,
}

/// Arguments for the `patch-paths` command.
#[derive(Parser, Debug)]
pub struct PatchPathsArgs {
    /// Resolve relative paths against this directory
    #[arg(long)]
    pub base: Option<PathBuf>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
