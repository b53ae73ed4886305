use crate::error::{PgasError, Result};
use crate::types::{RequestNum, ThreadId};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Key of a request issued by one thread: `(request number, initiator)`.
pub type RequestKey = (RequestNum, ThreadId);

/// Pending operations of one kind, keyed by request.
///
/// The counter hands out request numbers that are unique among the
/// operations this registry tracks. All map mutations go through one lock, so
/// [`get_or_create`](Self::get_or_create) constructs at most one state per
/// key no matter how many handlers race on it.
pub struct RequestRegistry<K, S> {
    next: AtomicU64,
    states: Mutex<HashMap<K, Arc<S>>>,
}

impl<K, S> Default for RequestRegistry<K, S> {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(0),
            states: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Copy, S> RequestRegistry<K, S> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<K, Arc<S>>>> {
        self.states
            .lock()
            .map_err(|_| PgasError::LockPoisoned("request registry"))
    }

    /// Allocate the next request number.
    pub fn next_request_num(&self) -> RequestNum {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Return the state for `key`, inserting `make()` if absent.
    pub fn get_or_create(&self, key: K, make: impl FnOnce() -> S) -> Result<Arc<S>> {
        let mut states = self.lock()?;
        Ok(Arc::clone(
            states.entry(key).or_insert_with(|| Arc::new(make())),
        ))
    }

    pub fn get(&self, key: K) -> Result<Option<Arc<S>>> {
        Ok(self.lock()?.get(&key).cloned())
    }

    pub fn remove(&self, key: K) -> Result<Option<Arc<S>>> {
        Ok(self.lock()?.remove(&key))
    }

    pub fn contains(&self, key: K) -> bool {
        self.lock().map(|s| s.contains_key(&key)).unwrap_or(false)
    }

    /// Number of pending states.
    pub fn len(&self) -> usize {
        self.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S> RequestRegistry<RequestKey, S> {
    /// Register a brand-new request issued by `requester`.
    ///
    /// A fresh request number is allocated and passed to `make`; the state is
    /// inserted under `(number, requester)` and returned with its number.
    pub fn create(
        &self,
        requester: ThreadId,
        make: impl FnOnce(RequestNum) -> S,
    ) -> Result<(RequestNum, Arc<S>)> {
        let num = self.next_request_num();
        let state = Arc::new(make(num));
        let mut states = self.lock()?;
        states.insert((num, requester), Arc::clone(&state));
        Ok((num, state))
    }
}

/// Notification counter of a pending state.
///
/// Starts at the number of expected notifications; [`tick`](Self::tick)
/// returns `true` for exactly one caller, the one whose decrement reaches
/// zero. Everything gated on completion must run behind that `true`.
#[derive(Debug)]
pub struct Countdown {
    remaining: AtomicUsize,
}

impl Countdown {
    pub fn new(expected: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(expected),
        }
    }

    /// Record one notification. Surplus notifications are rejected and
    /// logged rather than wrapping the counter.
    pub fn tick(&self) -> bool {
        match self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(prev) => prev == 1,
            Err(_) => {
                tracing::warn!("notification received after countdown reached zero");
                false
            }
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn is_zero(&self) -> bool {
        self.remaining() == 0
    }
}
