//! Paths touched by a patch in the `*** Begin Patch` envelope format.
//!
//! ```text
//! *** Begin Patch
//! *** Add File: src/new.ts
//! *** Update File: src/old.ts
//! *** Move to: src/renamed.ts
//! *** Delete File: src/gone.ts
//! *** End Patch
//! ```

use crate::key::normalize_path;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const BEGIN_MARKER: &str = "*** Begin Patch";
const END_MARKER: &str = "*** End Patch";
const ADD_PREFIX: &str = "*** Add File: ";
const DELETE_PREFIX: &str = "*** Delete File: ";
const UPDATE_PREFIX: &str = "*** Update File: ";
const MOVE_PREFIX: &str = "*** Move to: ";

/// Every path a patch adds, deletes, updates or moves to, as written.
///
/// Only lines between a begin and an end marker count. Text without the
/// markers, or without directives, yields an empty set.
pub fn extract_patch_paths(text: &str) -> BTreeSet<String> {
    let mut paths = BTreeSet::new();
    // Paths of the open block; kept only once its end marker is seen.
    let mut block: Option<BTreeSet<String>> = None;
    let mut after_update = false;

    for line in text.lines() {
        let line = line.trim();
        let Some(current) = block.as_mut() else {
            if line == BEGIN_MARKER {
                block = Some(BTreeSet::new());
            }
            continue;
        };

        if line == END_MARKER {
            paths.append(current);
            block = None;
            after_update = false;
            continue;
        }

        if let Some(path) = line.strip_prefix(UPDATE_PREFIX) {
            insert_path(current, path);
            after_update = true;
            continue;
        }
        if after_update && let Some(path) = line.strip_prefix(MOVE_PREFIX) {
            insert_path(current, path);
        } else if let Some(path) = line
            .strip_prefix(ADD_PREFIX)
            .or_else(|| line.strip_prefix(DELETE_PREFIX))
        {
            insert_path(current, path);
        }
        after_update = false;
    }

    paths
}

/// [`extract_patch_paths`] with relative paths resolved against `base`.
pub fn resolve_patch_paths<P: AsRef<Path>>(text: &str, base: P) -> BTreeSet<PathBuf> {
    let base = base.as_ref();
    extract_patch_paths(text)
        .into_iter()
        .map(|path| {
            let path = Path::new(&path);
            if path.is_absolute() {
                normalize_path(path)
            } else {
                normalize_path(&base.join(path))
            }
        })
        .collect()
}

fn insert_path(paths: &mut BTreeSet<String>, raw: &str) {
    let path = raw.trim();
    if !path.is_empty() {
        paths.insert(path.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_add_update_and_move() {
        let patch = "*** Begin Patch\n\
                     *** Add File: a.ts\n\
                     +export const a = 1;\n\
                     *** Update File: b.ts\n\
                     *** Move to: c.ts\n\
                     @@\n\
                     -old\n\
                     +new\n\
                     *** End Patch\n";
        assert_eq!(extract_patch_paths(patch), set(&["a.ts", "b.ts", "c.ts"]));
    }

    #[test]
    fn test_delete_file() {
        let patch = "*** Begin Patch\n*** Delete File: src/gone.rs\n*** End Patch";
        assert_eq!(extract_patch_paths(patch), set(&["src/gone.rs"]));
    }

    #[test]
    fn test_markers_without_directives_is_empty() {
        assert!(extract_patch_paths("*** Begin Patch\n*** End Patch\n").is_empty());
    }

    #[test]
    fn test_missing_markers_is_empty() {
        assert!(extract_patch_paths("*** Add File: a.ts\n").is_empty());
        assert!(extract_patch_paths("").is_empty());
    }

    #[test]
    fn test_unterminated_patch_is_empty() {
        assert!(extract_patch_paths("*** Begin Patch\n*** Add File: a.ts\n").is_empty());
    }

    #[test]
    fn test_move_only_counts_after_update() {
        let patch = "*** Begin Patch\n\
                     *** Add File: a.ts\n\
                     *** Move to: b.ts\n\
                     *** End Patch";
        assert_eq!(extract_patch_paths(patch), set(&["a.ts"]));
    }

    #[test]
    fn test_lines_outside_markers_are_ignored() {
        let patch = "*** Update File: before.ts\n\
                     *** Begin Patch\n\
                     *** Update File: inside.ts\n\
                     *** End Patch\n\
                     *** Delete File: after.ts\n";
        assert_eq!(extract_patch_paths(patch), set(&["inside.ts"]));
    }

    #[test]
    fn test_multiple_blocks_and_trailing_whitespace() {
        let patch = "*** Begin Patch\n*** Add File: one.ts  \n*** End Patch\n\
                     *** Begin Patch\r\n*** Update File: two.ts\r\n*** End Patch\r\n";
        assert_eq!(extract_patch_paths(patch), set(&["one.ts", "two.ts"]));
    }

    #[test]
    fn test_resolve_against_base() {
        let patch = "*** Begin Patch\n\
                     *** Add File: src/./a.ts\n\
                     *** Delete File: /abs/b.ts\n\
                     *** End Patch";
        let resolved = resolve_patch_paths(patch, "/repo");
        let expected: BTreeSet<PathBuf> = [PathBuf::from("/repo/src/a.ts"), PathBuf::from("/abs/b.ts")]
            .into_iter()
            .collect();
        assert_eq!(resolved, expected);
    }
}
