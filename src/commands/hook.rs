//! Implementation of the `agentlock hook` command.
//!
//! Protocol: one JSON event per line on stdin, e.g.
//!
//! ```text
//! {"id": 7, "event": "tool_before", "session_id": "S1", "tool": "write", "args": {"file_path": "src/a.ts"}}
//! {"id": 8, "event": "session_idle", "session_id": "S1"}
//! ```
//!
//! Each event is answered with one line on stdout carrying the same `id`:
//! `{"id": 7, "ok": true, "locks": ["file:/repo/src/a.ts"]}`. Tool events may
//! block waiting for a lock, so each runs on its own thread and responses can
//! arrive out of order. Lifecycle events are handled in stream order.

use super::open_coordinator;
use crate::coordinator::LockCoordinator;
use crate::error::{AgentLockError, Result};
use crate::hook::{Hook, HookOutcome, HostEvent};
use serde::Serialize;
use serde_json::Value;
use std::io::{self, BufRead, Write};
use std::sync::Mutex;
use std::thread;
use tracing::{info, warn};

/// One response line.
#[derive(Debug, Serialize)]
struct HookResponse {
    id: Value,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    locks: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    released: Option<usize>,
}

impl HookResponse {
    fn from_result(id: Value, result: Result<HookOutcome>) -> Self {
        let mut response = Self {
            id,
            ok: result.is_ok(),
            error: None,
            locks: Vec::new(),
            released: None,
        };
        match result {
            Ok(HookOutcome::Locked(keys)) => response.locks = keys,
            Ok(HookOutcome::Released(count)) => response.released = Some(count),
            Err(e) => response.error = Some(e.to_string()),
        }
        response
    }
}

/// Execute the `agentlock hook` command.
pub fn cmd_hook() -> Result<()> {
    let (ctx, config, coordinator) = open_coordinator()?;
    let hook = Hook::new(&ctx.cwd, config.exempt_matcher()?);
    info!(state_dir = %ctx.state_dir.display(), "serving host events");

    let stdin = io::stdin();
    let stdout = Mutex::new(io::stdout());
    serve(&coordinator, &hook, stdin.lock(), &stdout)
}

/// Answer every event in `input` until end of stream.
///
/// Returns once all outstanding tool events have been answered.
pub(crate) fn serve<R, W>(
    coordinator: &LockCoordinator,
    hook: &Hook,
    input: R,
    output: &Mutex<W>,
) -> Result<()>
where
    R: BufRead,
    W: Write + Send,
{
    thread::scope(|scope| {
        for line in input.lines() {
            let line = line.map_err(|e| {
                AgentLockError::IoError(format!("failed to read event stream: {}", e))
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let (id, event) = match parse_event(&line) {
                Ok(parsed) => parsed,
                Err((id, e)) => {
                    warn!(error = %e, "rejected host event");
                    respond(output, &HookResponse::from_result(id, Err(e)));
                    continue;
                }
            };

            match event {
                HostEvent::ToolBefore { .. } => {
                    scope.spawn(move || {
                        let result = hook.handle(coordinator, &event);
                        respond(output, &HookResponse::from_result(id, result));
                    });
                }
                HostEvent::SessionIdle { .. } | HostEvent::SessionDeleted { .. } => {
                    let result = hook.handle(coordinator, &event);
                    respond(output, &HookResponse::from_result(id, result));
                }
            }
        }
        Ok(())
    })
}

/// Parse one event line, keeping its `id` even when the event is invalid.
fn parse_event(line: &str) -> std::result::Result<(Value, HostEvent), (Value, AgentLockError)> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        (
            Value::Null,
            AgentLockError::UserError(format!("invalid event JSON: {}", e)),
        )
    })?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    match serde_json::from_value::<HostEvent>(value) {
        Ok(event) => Ok((id, event)),
        Err(e) => Err((id, AgentLockError::UserError(format!("invalid event: {}", e)))),
    }
}

fn respond<W: Write>(output: &Mutex<W>, response: &HookResponse) {
    let line = match serde_json::to_string(response) {
        Ok(line) => line,
        Err(e) => {
            warn!(error = %e, "failed to serialize hook response");
            return;
        }
    };
    let mut out = output.lock().unwrap_or_else(|poison| poison.into_inner());
    if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
        warn!(error = %e, "failed to write hook response");
    }
}
