//! Agentlock: cross-process lock coordination for concurrent agent sessions.
//!
//! Several agent sessions editing one working tree serialize their writes
//! through per-file locks and their state-changing git commands through a
//! per-repository lock. Locks live in a shared SQLite store with a FIFO wait
//! queue per key; a refreshed lock file next to each record lets waiters
//! detect and reclaim locks whose holder crashed.
//!
//! The [`coordinator::LockCoordinator`] is the entry point; [`hook`] adapts
//! host tool events onto it.

pub mod classify;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod exit_codes;
pub mod filelock;
pub mod git;
pub mod hook;
pub mod key;
pub mod logging;
pub mod notify;
pub mod patch;
pub mod store;

#[cfg(test)]
mod test_support;

pub use coordinator::{CoordinatorOptions, LockCoordinator};
pub use error::{AgentLockError, Result};
pub use key::{LockKey, LockKind};
