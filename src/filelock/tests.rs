//! Tests for the lock file layer.

use super::*;
use std::fs::File;
use std::thread;
use tempfile::TempDir;

fn fast_options() -> FileLockOptions {
    FileLockOptions {
        stale_threshold: Duration::from_millis(300),
        refresh_interval: Duration::from_millis(40),
    }
}

fn backdate(path: &Path, by: Duration) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - by).unwrap();
}

#[test]
fn test_path_is_stable_and_distinct() {
    let temp_dir = TempDir::new().unwrap();
    let locks = FileLocks::new(temp_dir.path(), fast_options());

    let a1 = locks.path_for("file:/repo/a.ts");
    let a2 = FileLocks::new(temp_dir.path(), FileLockOptions::default()).path_for("file:/repo/a.ts");
    let b = locks.path_for("file:/repo/b.ts");

    assert_eq!(a1, a2);
    assert_ne!(a1, b);
    assert!(a1.starts_with(temp_dir.path()));
    assert_eq!(a1.extension().and_then(|e| e.to_str()), Some("lock"));
}

#[test]
fn test_try_lock_writes_metadata() {
    let temp_dir = TempDir::new().unwrap();
    let locks = FileLocks::new(temp_dir.path().join("locks"), fast_options());

    let handle = locks.try_lock("repo:/repo", "/repo").unwrap().unwrap();
    let meta = LockFileMetadata::from_file(handle.path()).unwrap();

    assert_eq!(meta.key, "repo:/repo");
    assert_eq!(meta.target, "/repo");
    assert_eq!(meta.pid, std::process::id());
    assert!(meta.owner.contains('@'));
    assert!(handle.is_intact());
}

#[test]
fn test_try_lock_is_exclusive() {
    let temp_dir = TempDir::new().unwrap();
    let locks = FileLocks::new(temp_dir.path(), fast_options());

    let first = locks.try_lock("file:/a", "/a").unwrap();
    assert!(first.is_some());
    assert!(locks.try_lock("file:/a", "/a").unwrap().is_none());

    // Different keys never collide.
    assert!(locks.try_lock("file:/b", "/b").unwrap().is_some());
}

#[test]
fn test_release_removes_file() {
    let temp_dir = TempDir::new().unwrap();
    let locks = FileLocks::new(temp_dir.path(), fast_options());

    let handle = locks.try_lock("file:/a", "/a").unwrap().unwrap();
    let path = handle.path().to_path_buf();
    handle.release().unwrap();

    assert!(!path.exists());
    assert!(locks.try_lock("file:/a", "/a").unwrap().is_some());
}

#[test]
fn test_drop_removes_file() {
    let temp_dir = TempDir::new().unwrap();
    let locks = FileLocks::new(temp_dir.path(), fast_options());

    let handle = locks.try_lock("file:/a", "/a").unwrap().unwrap();
    let path = handle.path().to_path_buf();
    drop(handle);

    assert!(!path.exists());
}

#[test]
fn test_refresher_keeps_lock_fresh() {
    let temp_dir = TempDir::new().unwrap();
    let locks = FileLocks::new(temp_dir.path(), fast_options());

    let handle = locks.try_lock("file:/a", "/a").unwrap().unwrap();
    backdate(handle.path(), Duration::from_secs(60));
    assert!(locks.is_stale(handle.path()));

    // Within a few refresh intervals the mtime is current again.
    thread::sleep(Duration::from_millis(200));
    assert!(!locks.is_stale(handle.path()));
}

#[test]
fn test_abandoned_file_becomes_stale() {
    let temp_dir = TempDir::new().unwrap();
    let locks = FileLocks::new(temp_dir.path(), fast_options());

    // A file with no refresher behind it, as left by a crashed process.
    let path = locks.path_for("file:/a");
    fs::write(&path, LockFileMetadata::new("file:/a", "/a").to_json().unwrap()).unwrap();
    assert!(!locks.is_stale(&path));

    backdate(&path, Duration::from_secs(5));
    assert!(locks.is_stale(&path));
}

#[test]
fn test_missing_file_is_stale() {
    let temp_dir = TempDir::new().unwrap();
    let locks = FileLocks::new(temp_dir.path(), fast_options());
    assert!(locks.is_stale(&locks.path_for("file:/missing")));
    assert!(locks.age(&locks.path_for("file:/missing")).is_none());
}

#[test]
fn test_unlock_foreign_file() {
    let temp_dir = TempDir::new().unwrap();
    let locks = FileLocks::new(temp_dir.path(), fast_options());

    let path = locks.path_for("file:/a");
    fs::write(&path, "{}").unwrap();

    assert!(locks.unlock(&path));
    assert!(!path.exists());
    assert!(!locks.unlock(&path));
}

#[test]
fn test_release_after_takeover_leaves_new_owner() {
    let temp_dir = TempDir::new().unwrap();
    let locks = FileLocks::new(temp_dir.path(), fast_options());

    let old = locks.try_lock("file:/a", "/a").unwrap().unwrap();
    let path = old.path().to_path_buf();

    // Another contender reaps the file and takes the key.
    assert!(locks.unlock(&path));
    let new = locks.try_lock("file:/a", "/a").unwrap().unwrap();
    assert!(!old.is_intact());

    old.release().unwrap();
    assert!(path.exists());
    assert!(new.is_intact());
}

#[test]
fn test_adopt_existing_file_mints_new_token_and_refreshes() {
    let temp_dir = TempDir::new().unwrap();
    let locks = FileLocks::new(temp_dir.path(), fast_options());

    let path = locks.path_for("repo:/repo");
    let original = LockFileMetadata::new("repo:/repo", "/repo");
    fs::write(&path, original.to_json().unwrap()).unwrap();
    backdate(&path, Duration::from_secs(60));

    let handle = locks.adopt("repo:/repo", "/repo", &path).unwrap();
    assert!(!locks.is_stale(&path));
    let adopted = LockFileMetadata::from_file(&path).unwrap();
    assert_ne!(adopted.token, original.token);
    assert_eq!(adopted.key, "repo:/repo");

    handle.release().unwrap();
    assert!(!path.exists());
}

#[test]
fn test_superseded_handle_cannot_remove_adopted_file() {
    let temp_dir = TempDir::new().unwrap();
    let locks = FileLocks::new(temp_dir.path(), fast_options());

    let first = locks.try_lock("file:/repo/a.ts", "/repo/a.ts").unwrap().unwrap();
    let path = first.path().to_path_buf();
    let second = locks.adopt("file:/repo/a.ts", "/repo/a.ts", &path).unwrap();

    assert!(!first.is_intact());
    first.release().unwrap();

    assert!(path.exists());
    assert!(second.is_intact());
    thread::sleep(Duration::from_millis(120));
    assert!(!locks.is_stale(&path));

    second.release().unwrap();
    assert!(!path.exists());
}

#[test]
fn test_adopt_missing_file_recreates_it() {
    let temp_dir = TempDir::new().unwrap();
    let locks = FileLocks::new(temp_dir.path(), fast_options());

    let path = locks.path_for("repo:/repo");
    let handle = locks.adopt("repo:/repo", "/repo", &path).unwrap();

    assert!(path.exists());
    assert!(handle.is_intact());
}

#[test]
fn test_format_age() {
    assert_eq!(format_age(Duration::from_secs(5)), "5s");
    assert_eq!(format_age(Duration::from_secs(125)), "2m 5s");
    assert_eq!(format_age(Duration::from_secs(3 * 3600 + 60)), "3h 1m");
}
