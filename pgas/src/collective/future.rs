use crate::error::{PgasError, Result};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Single-assignment result of a distributed operation.
///
/// The future is completed exactly once, with either a value or an error.
/// Application threads block in [`get`](Self::get) or
/// [`get_timeout`](Self::get_timeout); async callers use
/// [`wait`](Self::wait). Clones share the same slot, so any number of
/// waiters observe the single completion.
pub struct PgasFuture<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    cond: Condvar,
    notify: Notify,
}

struct Slot<T> {
    /// Bumped on every real state change. Waiters only trust a wakeup that
    /// observed a new round.
    round: u64,
    outcome: Option<Result<T>>,
}

impl<T> Clone for PgasFuture<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for PgasFuture<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for PgasFuture<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgasFuture")
            .field("done", &self.is_done())
            .finish()
    }
}

impl<T> PgasFuture<T> {
    /// A pending future.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    round: 0,
                    outcome: None,
                }),
                cond: Condvar::new(),
                notify: Notify::new(),
            }),
        }
    }

    /// A future that is already completed with `value`.
    pub fn ready(value: T) -> Self {
        let fut = Self::new();
        fut.signal_done(value);
        fut
    }

    /// A future that is already completed with `err`.
    pub fn failed(err: PgasError) -> Self {
        let fut = Self::new();
        fut.signal_exception(err);
        fut
    }

    fn lock(&self) -> Result<MutexGuard<'_, Slot<T>>> {
        self.shared
            .slot
            .lock()
            .map_err(|_| PgasError::LockPoisoned("future"))
    }

    /// Complete with a value. Returns `false` if the future was already done.
    pub fn signal_done(&self, value: T) -> bool {
        self.complete(Ok(value))
    }

    /// Complete with an error. Returns `false` if the future was already done.
    pub fn signal_exception(&self, err: PgasError) -> bool {
        self.complete(Err(err))
    }

    /// Complete with `outcome`; a second completion is ignored.
    pub fn complete(&self, outcome: Result<T>) -> bool {
        let Ok(mut slot) = self.lock() else {
            return false;
        };
        if slot.outcome.is_some() {
            tracing::warn!("future already completed, ignoring second signal");
            return false;
        }
        slot.outcome = Some(outcome);
        slot.round += 1;
        drop(slot);
        self.shared.cond.notify_all();
        self.shared.notify.notify_waiters();
        true
    }

    /// Non-blocking completion check.
    pub fn is_done(&self) -> bool {
        self.lock().map(|s| s.outcome.is_some()).unwrap_or(false)
    }
}

impl<T: Clone> PgasFuture<T> {
    /// Block until completed, then return the value or propagate the error.
    pub fn get(&self) -> Result<T> {
        let mut slot = self.lock()?;
        loop {
            if let Some(outcome) = &slot.outcome {
                return outcome.clone();
            }
            let seen = slot.round;
            while slot.round == seen {
                slot = self
                    .shared
                    .cond
                    .wait(slot)
                    .map_err(|_| PgasError::LockPoisoned("future"))?;
            }
        }
    }

    /// Block for at most `timeout`.
    ///
    /// On expiry this returns [`PgasError::Timeout`] and leaves the future
    /// pending; the operation keeps running and a later `get` still sees its
    /// result. A timeout too large to express as a deadline waits like
    /// [`get`](Self::get).
    pub fn get_timeout(&self, timeout: Duration) -> Result<T> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.get();
        };
        let mut slot = self.lock()?;
        loop {
            if let Some(outcome) = &slot.outcome {
                return outcome.clone();
            }
            let seen = slot.round;
            while slot.round == seen {
                let now = Instant::now();
                if now >= deadline {
                    return Err(timeout_error(timeout));
                }
                let (next, _) = self
                    .shared
                    .cond
                    .wait_timeout(slot, deadline - now)
                    .map_err(|_| PgasError::LockPoisoned("future"))?;
                slot = next;
            }
        }
    }

    /// Wait asynchronously. Intended for callers running on a tokio runtime,
    /// where blocking in [`get`](Self::get) would stall a worker.
    pub async fn wait(&self) -> Result<T> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let current = self.lock()?.outcome.clone();
            if let Some(outcome) = current {
                return outcome;
            }
            notified.await;
        }
    }
}

fn timeout_error(timeout: Duration) -> PgasError {
    PgasError::Timeout {
        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    }
}
