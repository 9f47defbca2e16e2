use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use crate::binding;
use crate::router::{DispatchReport, Router};
use crate::scope::Scope;
use crate::store::{StateStore, SubscriptionHandle};
use crate::value::{HandlerId, OwnerId, StateValue};

/// Store key the default fallback writes user-visible notices to.
pub const NOTICE_KEY: &str = "notice";

/// The native ↔ dynamic-UI bridge.
///
/// Owns the process-wide [`StateStore`] and [`Router`]. Create one at
/// startup and hand it (or an `Arc` of it) to whatever needs it.
///
/// # Examples
///
/// ```ignore
/// let bridge = Bridge::new();
///
/// bridge.on("open_cart", |_, _, store| async move {
///     store.update("app/route", "cart");
///     Ok(())
/// });
///
/// let badge = bridge.scope("cart_badge");
/// badge.listen("cartItemCount", |_, v| println!("count: {:?}", v));
///
/// bridge.dispatch("open_cart", Value::Null).await;
/// ```
pub struct Bridge {
    store: Arc<StateStore>,
    router: Arc<Router>,
    next_owner: AtomicU64,
}

impl Bridge {
    /// A bridge with an empty store, no handlers, and the notice fallback.
    pub fn new() -> Self {
        let router = Router::new();
        router.set_fallback(unknown_channel_notice);
        Self {
            store: Arc::new(StateStore::new()),
            router: Arc::new(router),
            next_owner: AtomicU64::new(1),
        }
    }

    // ====================================================================
    // State
    // ====================================================================

    pub fn update(&self, key: &str, value: impl Into<Value>) {
        self.store.update(key, value);
    }

    pub fn update_value(&self, key: &str, value: StateValue) {
        self.store.update_value(key, value);
    }

    pub fn get_value(&self, key: &str) -> Option<StateValue> {
        self.store.get_value(key)
    }

    pub fn clear(&self, key: &str) {
        self.store.clear(key);
    }

    /// Observe future writes to `key`. See [`StateStore::listen`].
    pub fn listen<F>(&self, key: &str, callback: F) -> SubscriptionHandle
    where
        F: Fn(&str, &StateValue) + Send + Sync + 'static,
    {
        self.store.listen(key, callback)
    }

    pub fn snapshot(&self) -> Vec<(String, StateValue)> {
        self.store.snapshot()
    }

    /// Interpolate `{{ ... }}` placeholders against the current state.
    pub fn render(&self, template: &str) -> String {
        binding::render(template, &self.store)
    }

    // ====================================================================
    // Messages
    // ====================================================================

    /// Register a handler that lives as long as the bridge.
    pub fn on<F, Fut>(&self, channel: &str, handler: F) -> HandlerId
    where
        F: Fn(String, Arc<Value>, Arc<StateStore>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.router.add_handler(OwnerId::ROOT, channel, handler)
    }

    pub fn remove_handler(&self, channel: &str, id: HandlerId) -> bool {
        self.router.remove_handler(channel, id)
    }

    pub fn remove_all_for_owner(&self, owner: OwnerId) -> usize {
        self.router.remove_all_for_owner(owner)
    }

    /// Replace the unknown-channel fallback (default: write a notice).
    pub fn set_fallback<F>(&self, fallback: F)
    where
        F: Fn(&str, &Value, &StateStore) + Send + Sync + 'static,
    {
        self.router.set_fallback(fallback);
    }

    pub fn has_handler(&self, channel: &str) -> bool {
        self.router.has_handler(channel)
    }

    /// Send a message from the UI layer. Never fails.
    pub async fn dispatch(&self, channel: &str, payload: impl Into<Value>) -> DispatchReport {
        self.router
            .dispatch(channel, payload.into(), Arc::clone(&self.store))
            .await
    }

    // ====================================================================
    // Lifecycle
    // ====================================================================

    /// Mount a component scope with a fresh owner id.
    pub fn scope(&self, name: &str) -> Scope {
        let owner = OwnerId(self.next_owner.fetch_add(1, Ordering::Relaxed));
        Scope::new(
            owner,
            name,
            Arc::clone(&self.store),
            Arc::clone(&self.router),
        )
    }

    /// Subscriptions not yet cancelled, across all scopes.
    pub fn live_subscriptions(&self) -> usize {
        self.store.live_subscriptions()
    }

    pub fn handler_count(&self) -> usize {
        self.router.handler_count()
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

fn unknown_channel_notice(channel: &str, _payload: &Value, store: &StateStore) {
    tracing::warn!(channel, "no handler registered for channel");
    store.update(
        NOTICE_KEY,
        json!({
            "kind": "unknown_channel",
            "channel": channel,
            "message": format!("This action isn't available: {channel}"),
        }),
    );
}
