//! Keyed state map guarded by a single per-limiter lock.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Per-key state owned by one limiter instance.
///
/// One mutex protects every key. Operations are O(1) amortized, so a single
/// lock keeps successive acquires for a key linearized without sharding.
///
/// Every accessor reads the clock after taking the lock and hands that
/// instant to the callback, so the instants a key's state observes never go
/// backwards.
#[derive(Debug)]
pub(crate) struct KeyedState<S> {
    entries: Mutex<HashMap<String, S>>,
}

impl<S> Default for KeyedState<S> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<S> KeyedState<S> {
    /// Runs `f` on the state for `key`, creating it with `init` on first use.
    pub(crate) fn with<R>(
        &self,
        key: &str,
        init: impl FnOnce(Instant) -> S,
        f: impl FnOnce(&mut S, Instant) -> R,
    ) -> R {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        if let Some(state) = entries.get_mut(key) {
            return f(state, now);
        }
        let state = entries.entry(key.to_owned()).or_insert_with(|| init(now));
        f(state, now)
    }

    /// Runs `f` on the state for `key` only if it already exists.
    pub(crate) fn with_existing<R>(&self, key: &str, f: impl FnOnce(&mut S, Instant) -> R) -> Option<R> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        entries.get_mut(key).map(|state| f(state, now))
    }

    /// Runs `f` on every tracked key.
    pub(crate) fn for_each(&self, mut f: impl FnMut(&mut S, Instant)) {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        for state in entries.values_mut() {
            f(state, now);
        }
    }

    /// Removes every key for which `evict` returns true. Returns the count.
    pub(crate) fn evict(&self, mut evict: impl FnMut(&mut S, Instant) -> bool) -> usize {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, state| !evict(state, now));
        before - entries.len()
    }

    /// Number of tracked keys.
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
