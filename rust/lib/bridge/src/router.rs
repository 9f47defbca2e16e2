use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::scope::Liveness;
use crate::store::StateStore;
use crate::trie::Trie;
use crate::value::{HandlerId, OwnerId};

/// A boxed, `Send`-able future returned by channel handlers.
pub type BoxFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Type-erased handler stored in the routing table.
///
/// Takes owned values so the returned future can be `'static`:
/// - `String`: the dispatched channel name
/// - `Arc<Value>`: the message payload, shared across fan-out
/// - `Arc<StateStore>`: the store, for reading and writing results
type ErasedHandler = Arc<dyn Fn(String, Arc<Value>, Arc<StateStore>) -> BoxFuture + Send + Sync>;

/// Called once when a channel has no handlers: `(channel, payload, store)`.
pub type FallbackHandler = Arc<dyn Fn(&str, &Value, &StateStore) + Send + Sync>;

#[derive(Clone)]
struct Registration {
    id: HandlerId,
    owner: OwnerId,
    alive: Liveness,
    handler: ErasedHandler,
}

/// What a `dispatch` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers that were run.
    pub invoked: usize,
    /// Of those, how many returned an error or panicked.
    pub failed: usize,
    /// No handler was registered and the fallback ran instead.
    pub fallback: bool,
}

/// Channel router: maps channel names to ordered lists of async handlers.
///
/// Handlers run sequentially in registration order. A failing handler is
/// logged and skipped over; it never stops its siblings and never reaches
/// the caller. Unrouted messages go to a single fallback.
///
/// The table can be modified while a dispatch is running: dispatch works
/// from a snapshot, handlers added mid-flight wait for the next message,
/// and handlers removed mid-flight are not called.
pub struct Router {
    trie: Trie<Registration>,
    fallback: RwLock<FallbackHandler>,
    next_id: AtomicU64,
}

impl Router {
    pub fn new() -> Self {
        let fallback: FallbackHandler = Arc::new(|channel: &str, _: &Value, _: &StateStore| {
            warn!(channel, "message dropped: no handler and no fallback configured");
        });
        Self {
            trie: Trie::new(),
            fallback: RwLock::new(fallback),
            next_id: AtomicU64::new(1),
        }
    }

    /// Append a handler for `channel` on behalf of `owner`.
    ///
    /// Registering the same closure twice yields two invocations.
    pub fn add_handler<F, Fut>(&self, owner: OwnerId, channel: &str, handler: F) -> HandlerId
    where
        F: Fn(String, Arc<Value>, Arc<StateStore>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handler: ErasedHandler = Arc::new(
            move |channel: String, payload: Arc<Value>, store: Arc<StateStore>| -> BoxFuture {
                Box::pin(handler(channel, payload, store))
            },
        );
        self.trie.insert(
            channel,
            Registration {
                id,
                owner,
                alive: Liveness::new(),
                handler,
            },
        );
        debug!(channel, ?id, ?owner, "handler registered");
        id
    }

    /// Remove one handler. Returns `false` if it was not registered.
    pub fn remove_handler(&self, channel: &str, id: HandlerId) -> bool {
        let removed = self.trie.remove(channel, |route| {
            let hit = route.id == id;
            if hit {
                route.alive.end();
            }
            hit
        });
        removed > 0
    }

    /// Remove every handler registered by `owner`, on any channel.
    pub fn remove_all_for_owner(&self, owner: OwnerId) -> usize {
        let removed = self.trie.remove_where(|route| {
            let hit = route.owner == owner;
            if hit {
                route.alive.end();
            }
            hit
        });
        debug!(?owner, removed, "handlers removed for owner");
        removed
    }

    /// Replace the unknown-channel fallback.
    pub fn set_fallback<F>(&self, fallback: F)
    where
        F: Fn(&str, &Value, &StateStore) + Send + Sync + 'static,
    {
        *self.fallback.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(fallback);
    }

    /// Deliver `payload` to every handler of `channel`.
    pub async fn dispatch(
        &self,
        channel: &str,
        payload: Value,
        store: Arc<StateStore>,
    ) -> DispatchReport {
        let payload = Arc::new(payload);
        let mut routes = self.trie.matches(channel);

        if routes.is_empty() {
            debug!(channel, "unrouted message, running fallback");
            let fallback = self
                .fallback
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            fallback(channel, &payload, &store);
            return DispatchReport {
                fallback: true,
                ..DispatchReport::default()
            };
        }

        routes.sort_by_key(|r| r.id);
        let mut report = DispatchReport::default();

        for route in routes {
            if !route.alive.is_alive() {
                debug!(channel, id = ?route.id, "handler removed during dispatch, skipped");
                continue;
            }
            report.invoked += 1;

            let started = std::panic::catch_unwind(AssertUnwindSafe(|| {
                (route.handler)(channel.to_string(), Arc::clone(&payload), Arc::clone(&store))
            }));
            let outcome = match started {
                Ok(fut) => AssertUnwindSafe(fut).catch_unwind().await,
                Err(panic) => Err(panic),
            };

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    report.failed += 1;
                    warn!(channel, id = ?route.id, error = %format!("{err:#}"), "handler failed");
                }
                Err(panic) => {
                    report.failed += 1;
                    error!(
                        channel,
                        id = ?route.id,
                        panic = %panic_message(&*panic),
                        "handler panicked"
                    );
                }
            }
        }

        report
    }

    /// Whether `channel` would reach at least one handler.
    pub fn has_handler(&self, channel: &str) -> bool {
        !self.trie.matches(channel).is_empty()
    }

    /// Total registered handlers.
    pub fn handler_count(&self) -> usize {
        self.trie.len()
    }

    /// Handlers still registered by `owner`.
    pub fn handlers_for_owner(&self, owner: OwnerId) -> usize {
        self.trie.count_where(|route| route.owner == owner)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
