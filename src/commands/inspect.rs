//! Implementations of `agentlock classify` and `agentlock patch-paths`.
//!
//! Both are pure: they touch no lock state, which makes them handy for
//! checking what the hook would lock.

use crate::cli::{ClassifyArgs, PatchPathsArgs};
use crate::classify::classify;
use crate::error::{AgentLockError, Result};
use crate::patch::{extract_patch_paths, resolve_patch_paths};
use std::io::{self, Read};

/// Execute the `agentlock classify` command.
pub fn cmd_classify(args: ClassifyArgs) -> Result<()> {
    println!("{}", classify(&args.command));
    Ok(())
}

/// Execute the `agentlock patch-paths` command.
pub fn cmd_patch_paths(args: PatchPathsArgs) -> Result<()> {
    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .map_err(|e| AgentLockError::IoError(format!("failed to read patch from stdin: {}", e)))?;

    match args.base {
        Some(base) => {
            for path in resolve_patch_paths(&text, base) {
                println!("{}", path.display());
            }
        }
        None => {
            for path in extract_patch_paths(&text) {
                println!("{}", path);
            }
        }
    }
    Ok(())
}
