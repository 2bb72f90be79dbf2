//! Implementation of the `agentlock status` command.
//!
//! Lists held locks (flagging stale ones) and queued waiters per key.

use super::open_coordinator;
use crate::coordinator::LockSnapshot;
use crate::error::Result;
use std::fmt::Write as _;

/// Execute the `agentlock status` command.
pub fn cmd_status() -> Result<()> {
    let (ctx, _, coordinator) = open_coordinator()?;
    let snapshot = coordinator.snapshot()?;

    println!("State directory: {}", ctx.state_dir.display());
    println!();
    print!("{}", render(&snapshot));
    Ok(())
}

fn render(snapshot: &LockSnapshot) -> String {
    let mut out = String::new();

    if snapshot.locks.is_empty() {
        let _ = writeln!(out, "No active locks.");
    } else {
        let _ = writeln!(out, "Locks ({}):", snapshot.locks.len());
        for lock in &snapshot.locks {
            let _ = writeln!(out, "  {}", lock);
        }
    }

    let stale = snapshot.locks.iter().filter(|l| l.is_stale).count();
    if stale > 0 {
        let _ = writeln!(
            out,
            "\n{} stale lock(s); the next waiter for each will reclaim it.",
            stale
        );
    }

    if !snapshot.queue.is_empty() {
        let _ = writeln!(out, "\nQueue ({}):", snapshot.queue.len());
        let mut current_key: Option<&str> = None;
        let mut position = 0;
        for entry in &snapshot.queue {
            if current_key != Some(entry.key.as_str()) {
                current_key = Some(entry.key.as_str());
                position = 0;
                let _ = writeln!(out, "  {}", entry.key);
            }
            position += 1;
            let _ = writeln!(
                out,
                "    {}. {} (ticket {}, since {})",
                position,
                entry.session,
                entry.ticket,
                entry.enqueued_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
    }

    out
}
