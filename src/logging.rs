//! Diagnostic tracing for agentlock.
//!
//! - **Tracing (this module)**: diagnostics via `AGENTLOCK_LOG` (or
//!   `RUST_LOG`), written to stderr. Stdout stays reserved for command
//!   output and hook responses.
//! - **Status log (`notify::NdjsonSink`)**: the lock audit trail in
//!   `events.ndjson`, unaffected by the log filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "AGENTLOCK_LOG";

/// Initialize the tracing subscriber.
///
/// Reads `AGENTLOCK_LOG`, then `RUST_LOG`. Defaults to `warn` if neither is
/// set or parses.
///
/// ```bash
/// AGENTLOCK_LOG=agentlock=debug agentlock hook
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // A second initialization (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
