//! The acquire loop.

use super::{HeldLock, LockCoordinator};
use crate::error::{AgentLockError, Result};
use crate::key::LockKey;
use crate::notify::{LockStatus, Phase, emit};
use crate::store::LockRecord;
use chrono::Utc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What one pass of the acquire loop decided.
enum Step {
    Acquired,
    /// Re-check immediately (state changed under us).
    Retry,
    /// Sleep one poll interval, then re-check.
    Wait,
}

/// The key being acquired, in its stored forms.
struct Request<'a> {
    session: &'a str,
    key: &'a LockKey,
    key_str: String,
    target: String,
}

impl Request<'_> {
    fn status(&self, phase: Phase) -> LockStatus {
        LockStatus::for_key(
            phase,
            self.session,
            self.key.kind(),
            &self.key_str,
            &self.target,
        )
    }
}

/// Suppresses repeated `waiting` notifications.
///
/// A notification goes out when the queue position or the blocking owner
/// changes, or when the same state has persisted for a full interval.
struct WaitingDebounce {
    interval: Duration,
    last: Option<(Instant, Option<u64>, Option<String>)>,
}

impl WaitingDebounce {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    fn should_emit(&mut self, position: Option<u64>, owner: Option<&str>) -> bool {
        let now = Instant::now();
        let emit = match &self.last {
            None => true,
            Some((at, last_position, last_owner)) => {
                *last_position != position
                    || last_owner.as_deref() != owner
                    || now.duration_since(*at) >= self.interval
            }
        };
        if emit {
            self.last = Some((now, position, owner.map(str::to_string)));
        }
        emit
    }
}

impl LockCoordinator {
    /// Block until `session` holds `key`, or the max wait elapses.
    ///
    /// Re-acquiring a key the session already holds returns at once without
    /// queueing or notifying. Waiters are served in arrival order; a holder
    /// whose lock file has gone stale is reaped so the next waiter can
    /// proceed.
    ///
    /// # Errors
    ///
    /// * `LockTimeout` - The wait exceeded `max_wait`
    /// * `StoreError` - The lock store stayed unavailable past its retries
    /// * `IoError` - The locks directory could not be written
    pub fn acquire(&self, session: &str, key: &LockKey) -> Result<()> {
        let request = Request {
            session,
            key,
            key_str: key.as_string(),
            target: key.target().to_string_lossy().into_owned(),
        };

        if self.already_held(&request)? {
            debug!(session, key = %request.key_str, "lock already held by session");
            return Ok(());
        }

        let mut ticket = self.enqueue(&request)?;
        let result = self.wait_for_turn(&request, &mut ticket);

        // Leave no queue entry behind on any exit path.
        if let Err(e) = self.store.dequeue(ticket) {
            warn!(ticket, key = %request.key_str, error = %e, "failed to dequeue ticket");
        }

        result
    }

    /// Whether the lock table already names the session as holder.
    ///
    /// A key cached here returns silently. A key recorded by an earlier
    /// instance of the session is adopted: its lock file is refreshed again
    /// from this process.
    fn already_held(&self, request: &Request<'_>) -> Result<bool> {
        let holder = self.store.get_lock(&request.key_str)?;
        let cached = self
            .held()
            .get(&request.key_str)
            .is_some_and(|held| held.session == request.session);

        match holder {
            Some(record) if record.session == request.session => {
                if !cached && self.resume(request, &record)? {
                    self.notify_acquired(request, Instant::now());
                }
                Ok(true)
            }
            _ => {
                if cached {
                    // The record moved on (reaped while we were unresponsive);
                    // the cached handle no longer means anything.
                    warn!(
                        session = request.session,
                        key = %request.key_str,
                        "cached lock no longer recorded; re-acquiring"
                    );
                    if let Some(outdated) = self.take_held(&request.key_str, request.session)
                        && let Err(e) = outdated.release()
                    {
                        warn!(error = %e, "failed to release outdated lock handle");
                    }
                }
                Ok(false)
            }
        }
    }

    /// Take over the lock file of a record naming this session.
    ///
    /// Returns `false` when a concurrent request of the same session already
    /// cached the key. The cache check and the adoption happen under one
    /// guard; a key cached for the session is never adopted again.
    fn resume(&self, request: &Request<'_>, record: &LockRecord) -> Result<bool> {
        let replaced = {
            let mut held = self.held();
            if held
                .get(&request.key_str)
                .is_some_and(|h| h.session == request.session)
            {
                debug!(session = request.session, key = %request.key_str, "lock cached by a concurrent request");
                return Ok(false);
            }
            let handle = self
                .files
                .adopt(&request.key_str, &request.target, &record.lock_file_path)?;
            held.insert(
                request.key_str.clone(),
                HeldLock {
                    session: request.session.to_string(),
                    handle,
                },
            )
        };
        if let Some(outdated) = replaced {
            debug!(key = %request.key_str, session = %outdated.session, "replaced outdated cached lock handle");
        }
        info!(session = request.session, key = %request.key_str, "resumed recorded lock");
        Ok(true)
    }

    fn enqueue(&self, request: &Request<'_>) -> Result<i64> {
        let ticket = self.store.enqueue(
            &request.key_str,
            request.session,
            request.key.kind(),
            &request.target,
        )?;
        let position = self.store.queue_position(&request.key_str, ticket)?;
        emit(
            self.sink.as_ref(),
            &request
                .status(Phase::Queued)
                .with_queue(position.position, position.length),
        );
        Ok(ticket)
    }

    fn wait_for_turn(&self, request: &Request<'_>, ticket: &mut i64) -> Result<()> {
        let start = Instant::now();
        let mut debounce = WaitingDebounce::new(self.options.waiting_notify_interval);

        loop {
            let waited = start.elapsed();
            if waited > self.options.max_wait {
                let waited_ms = duration_ms(waited);
                emit(
                    self.sink.as_ref(),
                    &request.status(Phase::Timeout).with_wait_ms(waited_ms),
                );
                info!(session = request.session, key = %request.key_str, waited_ms, "lock wait timed out");
                return Err(AgentLockError::LockTimeout {
                    key: request.key_str.clone(),
                    waited_ms,
                });
            }

            match self.step(request, ticket, &mut debounce, start)? {
                Step::Acquired => return Ok(()),
                Step::Retry => continue,
                Step::Wait => thread::sleep(self.options.poll_interval),
            }
        }
    }

    fn step(
        &self,
        request: &Request<'_>,
        ticket: &mut i64,
        debounce: &mut WaitingDebounce,
        start: Instant,
    ) -> Result<Step> {
        let holder = self.store.get_lock(&request.key_str)?;
        if let Some(record) = &holder
            && record.session == request.session
        {
            // Recorded for this session meanwhile, by another instance or by
            // a concurrent request through this one.
            self.resume(request, record)?;
            self.notify_acquired(request, start);
            return Ok(Step::Acquired);
        }

        let position = self.store.queue_position(&request.key_str, *ticket)?;

        if position.position.is_none() {
            // Our entry was purged (the session was released mid-wait).
            // Rejoin at the back rather than jump the queue.
            warn!(
                session = request.session,
                key = %request.key_str,
                ticket = *ticket,
                "queue entry vanished; re-enqueueing"
            );
            *ticket = self.enqueue(request)?;
            return Ok(Step::Retry);
        }

        if !position.is_head() {
            let owner = holder
                .map(|r| r.session)
                .or(position.head_session.clone());
            self.notify_waiting(request, debounce, position.position, position.length, owner);
            return Ok(Step::Wait);
        }

        match holder {
            Some(record) => {
                if self.files.is_stale(&record.lock_file_path) {
                    self.reap(request, &record)?;
                    return Ok(Step::Retry);
                }
                self.notify_waiting(
                    request,
                    debounce,
                    position.position,
                    position.length,
                    Some(record.session),
                );
                Ok(Step::Wait)
            }
            None => self.try_take(request, start),
        }
    }

    /// Remove a dead holder's record and lock file.
    fn reap(&self, request: &Request<'_>, record: &LockRecord) -> Result<()> {
        // Only delete if the dead session still holds it; a concurrent
        // reaper may have beaten us.
        if self
            .store
            .delete_lock_if_held_by(&record.key, &record.session)?
        {
            self.files.unlock(&record.lock_file_path);
            info!(
                key = %record.key,
                dead_session = %record.session,
                reaper = request.session,
                "reaped stale lock"
            );
            emit(
                self.sink.as_ref(),
                &request
                    .status(Phase::StaleReaped)
                    .with_owner(Some(record.session.clone())),
            );
        }
        Ok(())
    }

    /// Head of the queue and no recorded holder: take the file, then the record.
    fn try_take(&self, request: &Request<'_>, start: Instant) -> Result<Step> {
        let Some(handle) = self.files.try_lock(&request.key_str, &request.target)? else {
            let path = self.files.path_for(&request.key_str);
            if self.files.is_stale(&path) {
                // A file without a record that nobody refreshes: its creator
                // died before recording the lock, or after deleting it.
                if self.files.unlock(&path) {
                    info!(key = %request.key_str, "removed orphaned lock file");
                }
                return Ok(Step::Retry);
            }
            debug!(key = %request.key_str, "lock file held without record; waiting");
            return Ok(Step::Wait);
        };

        let record = LockRecord {
            key: request.key_str.clone(),
            session: request.session.to_string(),
            kind: request.key.kind(),
            target: request.target.clone(),
            lock_file_path: handle.path().to_path_buf(),
            acquired_at: Utc::now(),
        };

        // Hold the cache guard from the insert until the handle is cached, so
        // a concurrent request of this session never adopts a file that is
        // about to be cached here.
        let mut held = self.held();
        if self.store.insert_lock(&record)? {
            let replaced = held.insert(
                request.key_str.clone(),
                HeldLock {
                    session: request.session.to_string(),
                    handle,
                },
            );
            drop(held);
            if replaced.is_some() {
                debug!(key = %request.key_str, "replaced outdated cached lock handle");
            }
            self.notify_acquired(request, start);
            Ok(Step::Acquired)
        } else {
            drop(held);
            debug!(key = %request.key_str, "lost insert race; retrying");
            if let Err(e) = handle.release() {
                warn!(error = %e, "failed to release lock file after lost race");
            }
            Ok(Step::Retry)
        }
    }

    fn notify_acquired(&self, request: &Request<'_>, start: Instant) {
        let wait_ms = duration_ms(start.elapsed());
        info!(session = request.session, key = %request.key_str, wait_ms, "lock acquired");
        emit(
            self.sink.as_ref(),
            &request.status(Phase::Acquired).with_wait_ms(wait_ms),
        );
    }

    fn notify_waiting(
        &self,
        request: &Request<'_>,
        debounce: &mut WaitingDebounce,
        position: Option<u64>,
        length: u64,
        owner: Option<String>,
    ) {
        if debounce.should_emit(position, owner.as_deref()) {
            emit(
                self.sink.as_ref(),
                &request
                    .status(Phase::Waiting)
                    .with_queue(position, length)
                    .with_owner(owner),
            );
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod debounce_tests {
    use super::WaitingDebounce;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_debounce_emits_on_change_only() {
        let mut debounce = WaitingDebounce::new(Duration::from_secs(60));
        assert!(debounce.should_emit(Some(2), Some("S1")));
        assert!(!debounce.should_emit(Some(2), Some("S1")));
        assert!(debounce.should_emit(Some(1), Some("S1")));
        assert!(debounce.should_emit(Some(1), Some("S3")));
        assert!(!debounce.should_emit(Some(1), Some("S3")));
    }

    #[test]
    fn test_debounce_repeats_after_interval() {
        let mut debounce = WaitingDebounce::new(Duration::from_millis(20));
        assert!(debounce.should_emit(Some(1), None));
        thread::sleep(Duration::from_millis(30));
        assert!(debounce.should_emit(Some(1), None));
    }
}
