use crate::context::StateContext;
use crate::coordinator::{CoordinatorOptions, LockCoordinator};
use crate::filelock::FileLockOptions;
use crate::notify::{LockStatus, StatusSink};
use crate::store::RetryPolicy;
use std::path::Path;
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Timings scaled down so coordinator tests finish in well under a second.
pub(crate) fn fast_options() -> CoordinatorOptions {
    CoordinatorOptions {
        max_wait: Duration::from_secs(5),
        poll_interval: Duration::from_millis(10),
        waiting_notify_interval: Duration::from_millis(200),
        file_lock: FileLockOptions {
            stale_threshold: Duration::from_millis(400),
            refresh_interval: Duration::from_millis(50),
        },
        retry: RetryPolicy {
            attempts: 20,
            base_delay: Duration::from_millis(2),
        },
    }
}

/// A sink that keeps every notification for later assertions.
#[derive(Debug, Default, Clone)]
pub(crate) struct RecordingSink {
    events: Arc<Mutex<Vec<LockStatus>>>,
}

impl RecordingSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn events(&self) -> Vec<LockStatus> {
        self.events
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    /// Phases observed for one session, in emission order.
    pub(crate) fn phases_for(&self, session: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.session_id == session)
            .map(|e| e.phase.to_string())
            .collect()
    }
}

impl StatusSink for RecordingSink {
    fn notify(&self, status: &LockStatus) -> crate::error::Result<()> {
        self.events
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(status.clone());
        Ok(())
    }
}

/// Open a coordinator over `state_dir`, recording its notifications.
///
/// Each call opens its own store connection, so two coordinators over the
/// same directory behave like two independent processes.
pub(crate) fn open_coordinator(
    state_dir: &Path,
    options: CoordinatorOptions,
) -> (LockCoordinator, RecordingSink) {
    let sink = RecordingSink::new();
    let ctx = StateContext::resolve_from(state_dir, Some(state_dir.to_path_buf()));
    let coordinator = LockCoordinator::open(&ctx, options, Box::new(sink.clone())).unwrap();
    (coordinator, sink)
}

pub(crate) fn create_test_repo() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path();

    git(path, &["init"]);
    git(path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(path, &["config", "user.email", "test@example.com"]);
    git(path, &["config", "user.name", "Test User"]);

    std::fs::write(path.join("README.md"), "# Test\n").unwrap();
    git(path, &["add", "."]);
    git(path, &["commit", "-m", "Initial commit"]);

    temp_dir
}

fn git(repo_dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .current_dir(repo_dir)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute git {}: {}", args.join(" "), e));

    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "git {} failed (exit code {:?})\nstdout:\n{}\nstderr:\n{}",
            args.join(" "),
            output.status.code(),
            stdout,
            stderr
        );
    }
}
