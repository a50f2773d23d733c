//! Process-wide ordered mutual exclusion keyed by opaque strings.
//!
//! Every key carries a priority level. A key at level `L` only waits for
//! earlier keys whose level is `>= L`, so passes spawned from user interaction
//! (level >= 1) are never stuck behind background passes (level 0), while two
//! passes for the same key can never run side by side.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Cloneable handle to a queued computation; every clone observes the same output.
pub type PendingProcess<T> = Shared<BoxFuture<'static, T>>;

struct QueueEntry<T: Clone> {
    key: String,
    level: u32,
    pending: PendingProcess<T>,
}

struct QueueState<T: Clone> {
    entries: Vec<QueueEntry<T>>,
    levels: HashMap<String, u32>,
}

impl<T: Clone> QueueState<T> {
    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.key == key)
    }

    fn push(&mut self, key: String, pending: PendingProcess<T>) {
        let level = self.levels.remove(&key).unwrap_or_default();
        self.entries.push(QueueEntry {
            key,
            level,
            pending,
        });
    }

    fn is_first(&self, key: &str, level: u32) -> bool {
        for entry in &self.entries {
            if entry.key == key {
                return true;
            }
            if entry.level >= level {
                return false;
            }
        }
        true
    }
}

/// Raised when a key never reaches the head of its level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("gave up waiting for queue turn of '{key}' after {waited:?}")]
pub struct TurnTimeout {
    pub key: String,
    pub waited: Duration,
}

pub struct ProcessQueue<T: Clone> {
    state: Mutex<QueueState<T>>,
    released: Notify,
}

impl<T: Clone> Default for ProcessQueue<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(QueueState {
                entries: Vec::new(),
                levels: HashMap::new(),
            }),
            released: Notify::new(),
        }
    }
}

impl<T> ProcessQueue<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, key: &str) -> bool {
        let guard = self.state.lock().expect("process queue mutex poisoned");
        guard.position(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<PendingProcess<T>> {
        let guard = self.state.lock().expect("process queue mutex poisoned");
        guard
            .position(key)
            .map(|index| guard.entries[index].pending.clone())
    }

    /// Records the level `key` will be queued with. Unset keys queue at level 0.
    pub fn set_level_to_process(&self, key: &str, level: u32) {
        let mut guard = self.state.lock().expect("process queue mutex poisoned");
        guard.levels.insert(key.to_string(), level);
    }

    /// Appends `key` in arrival order. Returns `false` if it is already queued.
    pub fn enqueue(&self, key: impl Into<String>, pending: PendingProcess<T>) -> bool {
        let key = key.into();
        let mut guard = self.state.lock().expect("process queue mutex poisoned");
        if guard.position(&key).is_some() {
            warn!(%key, "ignored duplicate enqueue for an in-flight key");
            return false;
        }
        guard.push(key, pending);
        true
    }

    /// Returns the in-flight computation for `key`, or queues the one built by
    /// `make_pending` at `level`. The boolean is `true` when a new entry was queued.
    pub fn join_or_enqueue<F>(
        &self,
        key: &str,
        level: u32,
        make_pending: F,
    ) -> (PendingProcess<T>, bool)
    where
        F: FnOnce() -> BoxFuture<'static, T>,
    {
        let mut guard = self.state.lock().expect("process queue mutex poisoned");
        if let Some(index) = guard.position(key) {
            return (guard.entries[index].pending.clone(), false);
        }

        let pending = make_pending().shared();
        guard.levels.insert(key.to_string(), level);
        guard.push(key.to_string(), pending.clone());
        (pending, true)
    }

    /// Removes `key` and wakes every task waiting for a turn.
    pub fn delete(&self, key: &str) -> bool {
        let removed = {
            let mut guard = self.state.lock().expect("process queue mutex poisoned");
            guard.levels.remove(key);
            match guard.position(key) {
                Some(index) => {
                    guard.entries.remove(index);
                    true
                }
                None => false,
            }
        };
        self.released.notify_waiters();
        removed
    }

    /// True when no earlier key with a level `>= level` is still queued.
    pub fn is_first(&self, key: &str, level: u32) -> bool {
        let guard = self.state.lock().expect("process queue mutex poisoned");
        guard.is_first(key, level)
    }

    /// True when `key` is queued and nothing else is.
    fn is_sole_entry(&self, key: &str) -> bool {
        let guard = self.state.lock().expect("process queue mutex poisoned");
        guard.entries.len() == 1 && guard.entries[0].key == key
    }

    pub fn len(&self) -> usize {
        let guard = self.state.lock().expect("process queue mutex poisoned");
        guard.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Suspends until `key` is first for `level`.
    ///
    /// Waiters re-check whenever an entry is deleted and at least once per
    /// `poll_interval`. With a `timeout`, gives up with [`TurnTimeout`].
    pub async fn wait_for_turn(
        &self,
        key: &str,
        level: u32,
        poll_interval: Duration,
        timeout: Option<Duration>,
    ) -> Result<(), TurnTimeout> {
        if self.is_sole_entry(key) {
            return Ok(());
        }

        let wait = async {
            loop {
                let released = self.released.notified();
                if self.is_first(key, level) {
                    return;
                }
                debug!(%key, level, "waiting for queue turn");
                tokio::select! {
                    _ = released => {}
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| TurnTimeout {
                    key: key.to_string(),
                    waited: limit,
                }),
            None => {
                wait.await;
                Ok(())
            }
        }
    }
}
