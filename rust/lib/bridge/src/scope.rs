//! Component lifecycles.
//!
//! A UI component that wants handlers or reactivity mounts a [`Scope`],
//! registers through it, and disposes it on unmount. Disposal runs once:
//! a second `dispose` (or the implicit one in `Drop`) is a no-op.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tracing::{debug, warn};

use crate::router::Router;
use crate::store::{StateStore, SubscriptionHandle};
use crate::value::{HandlerId, OwnerId, StateValue, SubscriptionId};

/// Shared "still mounted" flag.
///
/// Async work started by a component clones this and checks it before
/// applying results, since neither the store nor the router can cancel a
/// future that is already running.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Flip to dead. Returns `true` only for the call that did the flip.
    pub(crate) fn end(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Registrations owned by one mounted component.
pub struct Scope {
    owner: OwnerId,
    name: String,
    alive: Liveness,
    store: Arc<StateStore>,
    router: Arc<Router>,
    subscriptions: Mutex<Vec<SubscriptionHandle>>,
}

impl Scope {
    pub(crate) fn new(
        owner: OwnerId,
        name: &str,
        store: Arc<StateStore>,
        router: Arc<Router>,
    ) -> Self {
        debug!(scope = name, ?owner, "scope mounted");
        Self {
            owner,
            name: name.to_string(),
            alive: Liveness::new(),
            store,
            router,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_alive(&self) -> bool {
        self.alive.is_alive()
    }

    /// A clonable liveness flag for async work started by this scope.
    pub fn liveness(&self) -> Liveness {
        self.alive.clone()
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Register a channel handler owned by this scope.
    ///
    /// Returns `None` once the scope has been disposed.
    pub fn on<F, Fut>(&self, channel: &str, handler: F) -> Option<HandlerId>
    where
        F: Fn(String, Arc<Value>, Arc<StateStore>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if !self.is_alive() {
            warn!(scope = %self.name, channel, "handler registered on a disposed scope, ignored");
            return None;
        }
        Some(self.router.add_handler(self.owner, channel, handler))
    }

    /// Listen to a store key for as long as this scope is mounted.
    ///
    /// Returns `None` once the scope has been disposed.
    pub fn listen<F>(&self, key: &str, callback: F) -> Option<SubscriptionId>
    where
        F: Fn(&str, &StateValue) + Send + Sync + 'static,
    {
        if !self.is_alive() {
            warn!(scope = %self.name, key, "listen on a disposed scope, ignored");
            return None;
        }
        let handle = self.store.listen(key, callback);
        let id = handle.id();
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        Some(id)
    }

    /// Release every handler and subscription this scope registered.
    ///
    /// Returns `false` if the scope was already disposed.
    pub fn dispose(&self) -> bool {
        if !self.alive.end() {
            return false;
        }
        let subscriptions =
            std::mem::take(&mut *self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner));
        let listeners = subscriptions.len();
        for sub in &subscriptions {
            sub.cancel();
        }
        drop(subscriptions);
        let handlers = self.router.remove_all_for_owner(self.owner);
        debug!(scope = %self.name, owner = ?self.owner, handlers, listeners, "scope disposed");
        true
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("alive", &self.is_alive())
            .finish()
    }
}
