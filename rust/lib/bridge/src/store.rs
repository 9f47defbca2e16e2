use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use serde_json::Value;
use tracing::trace;

use crate::scope::Liveness;
use crate::trie::Trie;
use crate::value::{StateValue, SubscriptionId};

/// Callback invoked with `(key, new_value)` after a write.
pub type ChangeHandler = Arc<dyn Fn(&str, &StateValue) + Send + Sync>;

/// Shared key → JSON state, readable and writable from both sides of the
/// bridge.
///
/// - `update(key, value)` overwrites and synchronously notifies listeners
/// - `get_value(key)` reads the latest value, `None` if never written
/// - `listen(key, callback)` observes future writes; it does not replay the
///   current value, so read with `get_value` first
/// - `clear(key)` writes `null` (an ordinary write, listeners fire)
///
/// Last write wins. No lock is held while listeners run, so a listener may
/// read, write or cancel subscriptions on the same store.
pub struct StateStore {
    values: RwLock<BTreeMap<String, StateValue>>,
    listeners: Arc<Trie<Listener>>,
    next_id: AtomicU64,
    live: Arc<AtomicUsize>,
}

#[derive(Clone)]
struct Listener {
    id: SubscriptionId,
    alive: Liveness,
    callback: ChangeHandler,
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(BTreeMap::new()),
            listeners: Arc::new(Trie::new()),
            next_id: AtomicU64::new(1),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Overwrite `key` and notify its listeners.
    pub fn update(&self, key: &str, value: impl Into<Value>) {
        self.update_value(key, StateValue::new(value));
    }

    /// Overwrite `key` with a prebuilt value and notify its listeners.
    pub fn update_value(&self, key: &str, value: StateValue) {
        {
            let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
            values.insert(key.to_string(), value.clone());
        }

        let mut listeners = self.listeners.matches(key);
        listeners.sort_by_key(|l| l.id);
        trace!(key, listeners = listeners.len(), "state updated");

        for listener in listeners {
            // Cancelled after the snapshot was taken.
            if !listener.alive.is_alive() {
                continue;
            }
            (listener.callback)(key, &value);
        }
    }

    /// Latest value for `key`, or `None` if it was never written.
    pub fn get_value(&self, key: &str) -> Option<StateValue> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.get(key).cloned()
    }

    /// Write `null` to `key`.
    pub fn clear(&self, key: &str) {
        self.update_value(key, StateValue::null());
    }

    pub fn contains(&self, key: &str) -> bool {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries, ordered by key.
    pub fn snapshot(&self) -> Vec<(String, StateValue)> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// All keys, ordered.
    pub fn keys(&self) -> Vec<String> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.keys().cloned().collect()
    }

    /// Observe writes to keys matching `pattern`.
    ///
    /// The callback runs synchronously inside `update`. Dropping the
    /// returned handle cancels the subscription; call `detach` to keep it
    /// for the lifetime of the store.
    pub fn listen<F>(&self, pattern: &str, callback: F) -> SubscriptionHandle
    where
        F: Fn(&str, &StateValue) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let alive = Liveness::new();
        self.listeners.insert(
            pattern,
            Listener {
                id,
                alive: alive.clone(),
                callback: Arc::new(callback),
            },
        );
        self.live.fetch_add(1, Ordering::Relaxed);
        trace!(pattern, ?id, "listener added");

        SubscriptionHandle {
            id,
            pattern: pattern.to_string(),
            alive,
            listeners: Arc::downgrade(&self.listeners),
            live: Arc::clone(&self.live),
            detached: false,
        }
    }

    /// Number of subscriptions not yet cancelled.
    ///
    /// Components that forget to dispose show up here.
    pub fn live_subscriptions(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Owning handle for a store subscription.
///
/// `cancel` is idempotent. Once cancelled the callback is never invoked
/// again, even by an `update` already in progress.
#[must_use = "dropping the handle cancels the subscription"]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    pattern: String,
    alive: Liveness,
    listeners: Weak<Trie<Listener>>,
    live: Arc<AtomicUsize>,
    detached: bool,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_active(&self) -> bool {
        self.alive.is_alive()
    }

    /// Remove the subscription. Returns `false` if it was already cancelled.
    pub fn cancel(&self) -> bool {
        if !self.alive.end() {
            return false;
        }
        self.live.fetch_sub(1, Ordering::Relaxed);
        if let Some(listeners) = self.listeners.upgrade() {
            let id = self.id;
            listeners.remove(&self.pattern, |l| l.id == id);
        }
        trace!(pattern = %self.pattern, id = ?self.id, "listener cancelled");
        true
    }

    /// Give up ownership: the subscription stays active until the store is
    /// dropped.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if !self.detached {
            self.cancel();
        }
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("pattern", &self.pattern)
            .field("active", &self.is_active())
            .finish()
    }
}
