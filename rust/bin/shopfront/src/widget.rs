//! The one native widget: a cart badge.
//!
//! Pages embed it by binding to [`BADGE_KEY`]; the widget keeps that key in
//! step with `cartItemCount`.

use std::sync::Arc;

use serde_json::Value;

use shopfront_bridge::{Bridge, Scope, StateStore, StateValue};

use crate::handlers::CART_ITEM_COUNT;

pub const BADGE_KEY: &str = "widget/cart_badge";

pub struct CartBadge {
    scope: Scope,
}

impl CartBadge {
    /// Mount the badge and render the current count right away.
    pub fn mount(bridge: &Bridge) -> Self {
        let scope = bridge.scope("cart_badge");
        let store = Arc::clone(scope.store());

        render(&store, store.get_value(CART_ITEM_COUNT).as_ref());
        let target = Arc::downgrade(&store);
        scope.listen(CART_ITEM_COUNT, move |_, value| {
            if let Some(store) = target.upgrade() {
                render(&store, Some(value));
            }
        });

        Self { scope }
    }

    pub fn label(&self) -> Option<String> {
        self.scope
            .store()
            .get_value(BADGE_KEY)
            .and_then(|v| v.decode::<String>())
    }

    pub fn unmount(self) {
        self.scope.dispose();
    }
}

fn render(store: &StateStore, count: Option<&StateValue>) {
    let n = count.and_then(|v| v.as_json().as_u64()).unwrap_or(0);
    let label = if n > 99 {
        "Cart (99+)".to_string()
    } else {
        format!("Cart ({n})")
    };
    store.update(BADGE_KEY, Value::String(label));
}
