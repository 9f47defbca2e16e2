//! Shopfront bridge: the glue between native code and server-driven UI.
//!
//! Server-driven pages talk to native code through two primitives:
//!
//! - a shared [`StateStore`], a flat key → JSON map that pages read through
//!   `{{ key.field }}` bindings and native code writes with `update`
//! - a [`Router`] of named channels the pages `dispatch` into, fanned out to
//!   the native handlers registered for that channel
//!
//! Both are owned by one [`Bridge`] created at startup and passed around
//! explicitly. Components acquire handlers and subscriptions through a
//! [`Scope`]; disposing the scope (or dropping it) releases everything it
//! registered, exactly once.
//!
//! # Example
//!
//! ```ignore
//! use serde_json::json;
//! use shopfront_bridge::Bridge;
//!
//! let bridge = Bridge::new();
//! bridge.update("cartItemCount", json!(0));
//!
//! bridge.on("add_to_cart", |_, _, store| async move {
//!     let count = store.get_value("cartItemCount")
//!         .and_then(|v| v.as_json().as_i64())
//!         .unwrap_or(0);
//!     store.update("cartItemCount", json!(count + 1));
//!     Ok(())
//! });
//!
//! bridge.dispatch("add_to_cart", json!({ "productId": "p1" })).await;
//! assert_eq!(bridge.render("Cart ({{cartItemCount}})"), "Cart (1)");
//! ```
//!
//! # Keys and channels
//!
//! Store keys and channel names are plain strings. Listeners and handlers
//! may also use `/`-separated patterns with MQTT-style wildcards:
//! `cart/+` matches one level, `cart/#` everything below, `#` all.

pub mod binding;
pub mod bridge;
pub mod deeplink;
pub mod router;
pub mod scope;
pub mod store;
pub mod trie;
pub mod value;

pub use binding::render;
pub use bridge::{Bridge, NOTICE_KEY};
pub use deeplink::{
    DeepLinkDispatcher, LinkError, LinkStatus, Navigator, QueryParams, Resolution, Route,
    RouteTable,
};
pub use router::{BoxFuture, DispatchReport, FallbackHandler, Router};
pub use scope::{Liveness, Scope};
pub use store::{ChangeHandler, StateStore, SubscriptionHandle};
pub use value::{HandlerId, OwnerId, StateValue, SubscriptionId};
