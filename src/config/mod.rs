//! Configuration model for agentlock.
//!
//! This module defines the Config struct that represents `<state>/config.yaml`.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! sensible defaults for optional fields, and validation of the timing
//! relationships the coordinator relies on.

mod model;
mod operations;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export public API
pub use model::Config;
