//! Command implementations for agentlock.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, and the shared setup that opens a coordinator over the
//! resolved state directory.

mod hook;
mod inspect;
mod release;
mod status;

use crate::cli::Command;
use crate::config::Config;
use crate::context::StateContext;
use crate::coordinator::LockCoordinator;
use crate::error::Result;
use crate::notify::{FanoutSink, NdjsonSink, StatusSink, TracingSink};
use tracing::debug;

/// Dispatch a command to its implementation.
pub fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Hook => hook::cmd_hook(),
        Command::Release(args) => release::cmd_release(args),
        Command::Status => status::cmd_status(),
        Command::Classify(args) => inspect::cmd_classify(args),
        Command::PatchPaths(args) => inspect::cmd_patch_paths(args),
    }
}

/// Resolve the state directory, load its config, and open a coordinator.
fn open_coordinator() -> Result<(StateContext, Config, LockCoordinator)> {
    let ctx = StateContext::resolve()?;
    let config = Config::load_or_default(ctx.config_path())?;
    debug!(state_dir = %ctx.state_dir.display(), "opening lock coordinator");

    let coordinator = LockCoordinator::open(
        &ctx,
        config.coordinator_options(),
        status_sink(&ctx, &config),
    )?;
    Ok((ctx, config, coordinator))
}

/// Structured log lines always; the NDJSON status log when enabled.
fn status_sink(ctx: &StateContext, config: &Config) -> Box<dyn StatusSink> {
    let mut sink = FanoutSink::new().with(Box::new(TracingSink));
    if config.event_log {
        sink = sink.with(Box::new(NdjsonSink::new(ctx.events_file())));
    }
    Box::new(sink)
}
