use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use shopfront_bridge::{Navigator, QueryParams, Route, StateStore, NOTICE_KEY};

use crate::handlers::ROUTE;

/// Navigates by writing the current route into the store.
///
/// The rendering engine watches [`ROUTE`] and swaps screens; notices go to
/// the same key the unknown-channel fallback uses.
pub struct StoreNavigator {
    store: Arc<StateStore>,
}

impl StoreNavigator {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }
}

impl Navigator for StoreNavigator {
    fn navigate(&self, route: &Route, query: &QueryParams) {
        debug!(%route, query = query.raw(), "navigate");
        let mut value = json!(route);
        if !query.is_empty() {
            value["query"] = json!(query.raw());
        }
        self.store.update(ROUTE, value);
    }

    fn notify(&self, message: &str) {
        self.store.update(
            NOTICE_KEY,
            json!({ "kind": "unrecognized_link", "message": message }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigate_writes_route_with_query() {
        let store = Arc::new(StateStore::new());
        let nav = StoreNavigator::new(store.clone());

        nav.navigate(&Route::Cart, &QueryParams::empty());
        assert_eq!(store.get_value(ROUTE).unwrap().as_json(), &json!({ "screen": "cart" }));

        nav.navigate(&Route::Page("promo".into()), &QueryParams::parse("code=X"));
        assert_eq!(
            store.get_value(ROUTE).unwrap().as_json(),
            &json!({ "screen": "page", "page": "promo", "query": "code=X" })
        );
    }

    #[test]
    fn notify_writes_notice() {
        let store = Arc::new(StateStore::new());
        StoreNavigator::new(store.clone()).notify("nope");
        let notice = store.get_value(NOTICE_KEY).unwrap();
        assert_eq!(notice.lookup(["message"]), Some(&json!("nope")));
    }
}
