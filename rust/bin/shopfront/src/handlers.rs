//! Native handlers for the channels pages dispatch into.
//!
//! Handlers write their results back into the store under the keys below.
//! A backend failure never propagates to the page: the handler writes null
//! to its result key and records a `backend_error` analytics event.

use std::sync::Arc;

use anyhow::Context;
use serde_json::{json, Value};
use tracing::{info, warn};

use shopfront_bridge::{Bridge, HandlerId, Route, StateStore};
use shopfront_commerce::{Cart, StorefrontApi};

use crate::adapters::{Analytics, PaymentGateway, PaymentRequest};

// ── Store keys ──

pub const CART_ITEM_COUNT: &str = "cartItemCount";
pub const CART_ID: &str = "cart/id";
pub const CART_LINES: &str = "cart/lines";
pub const PRODUCTS: &str = "products";
pub const PAYMENT_STATUS: &str = "payment/status";
pub const ROUTE: &str = "app/route";

const DEFAULT_PAGE_SIZE: u32 = 10;

/// Collaborators the handlers call out to.
pub struct Services {
    pub storefront: Arc<dyn StorefrontApi>,
    pub analytics: Arc<dyn Analytics>,
    pub payments: Arc<dyn PaymentGateway>,
}

impl Services {
    fn backend_error(
        &self,
        store: &StateStore,
        channel: &str,
        key: &str,
        error: &dyn std::fmt::Display,
    ) {
        warn!(channel, %error, "backend call failed");
        store.update(key, Value::Null);
        self.analytics.track(
            "backend_error",
            &json!({ "channel": channel, "error": error.to_string() }),
        );
    }
}

/// Register every channel handler on `bridge`.
pub fn register(bridge: &Bridge, services: Arc<Services>) -> Vec<HandlerId> {
    let mut ids = Vec::new();

    let s = services.clone();
    ids.push(bridge.on("add_to_cart", move |channel, payload, store| {
        let s = s.clone();
        async move { add_to_cart(&s, &channel, &payload, &store).await }
    }));

    let s = services.clone();
    ids.push(bridge.on("remove_from_cart", move |channel, payload, store| {
        let s = s.clone();
        async move { remove_from_cart(&s, &channel, &payload, &store).await }
    }));

    let s = services.clone();
    ids.push(bridge.on("open_cart", move |_, _, store| {
        let s = s.clone();
        async move {
            store.update(ROUTE, serde_json::to_value(Route::Cart)?);
            s.analytics.track("open_cart", &Value::Null);
            Ok(())
        }
    }));

    let s = services.clone();
    ids.push(bridge.on("start_payment", move |channel, payload, store| {
        let s = s.clone();
        async move { start_payment(&s, &channel, &payload, &store).await }
    }));

    let s = services.clone();
    ids.push(bridge.on("log_event", move |_, payload, _| {
        let s = s.clone();
        async move {
            let name = payload
                .get("name")
                .and_then(Value::as_str)
                .context("log_event without a name")?;
            let properties = payload.get("properties").cloned().unwrap_or(Value::Null);
            s.analytics.track(name, &properties);
            Ok(())
        }
    }));

    let s = services;
    ids.push(bridge.on("load_products", move |channel, payload, store| {
        let s = s.clone();
        async move {
            let first = payload
                .get("first")
                .and_then(Value::as_u64)
                .map(|n| n.min(u32::MAX as u64) as u32)
                .unwrap_or(DEFAULT_PAGE_SIZE);
            match s.storefront.products(first).await {
                Ok(products) => store.update(PRODUCTS, serde_json::to_value(products)?),
                Err(e) => s.backend_error(&store, &channel, PRODUCTS, &e),
            }
            Ok(())
        }
    }));

    info!(handlers = ids.len(), "channel handlers registered");
    ids
}

/// `{ "variantId": "...", "quantity": 1 }`
async fn add_to_cart(
    s: &Services,
    channel: &str,
    payload: &Value,
    store: &StateStore,
) -> anyhow::Result<()> {
    let variant = payload
        .get("variantId")
        .and_then(Value::as_str)
        .context("add_to_cart without a variantId")?;
    let quantity = payload
        .get("quantity")
        .and_then(Value::as_u64)
        .map_or(1, |q| q.min(u32::MAX as u64) as u32);

    let cart_id = match store.get_value(CART_ID).and_then(|v| v.decode::<String>()) {
        Some(id) => id,
        None => match s.storefront.create_cart().await {
            Ok(cart) => {
                store.update(CART_ID, cart.id.clone());
                cart.id
            }
            Err(e) => {
                s.backend_error(store, channel, CART_LINES, &e);
                return Ok(());
            }
        },
    };

    match s.storefront.add_cart_line(&cart_id, variant, quantity).await {
        Ok(cart) => {
            write_cart(store, &cart)?;
            s.analytics.track(
                "add_to_cart",
                &json!({ "variantId": variant, "quantity": quantity }),
            );
        }
        Err(e) => s.backend_error(store, channel, CART_LINES, &e),
    }
    Ok(())
}

/// `{ "lineId": "..." }`
async fn remove_from_cart(
    s: &Services,
    channel: &str,
    payload: &Value,
    store: &StateStore,
) -> anyhow::Result<()> {
    let line = payload
        .get("lineId")
        .and_then(Value::as_str)
        .context("remove_from_cart without a lineId")?;
    let cart_id = store
        .get_value(CART_ID)
        .and_then(|v| v.decode::<String>())
        .context("remove_from_cart before a cart exists")?;

    match s.storefront.remove_cart_line(&cart_id, line).await {
        Ok(cart) => write_cart(store, &cart)?,
        Err(e) => s.backend_error(store, channel, CART_LINES, &e),
    }
    Ok(())
}

/// `{ "amount": "24.00", "currency": "EUR" }`; the current cart id is attached.
async fn start_payment(
    s: &Services,
    channel: &str,
    payload: &Value,
    store: &StateStore,
) -> anyhow::Result<()> {
    let mut request: PaymentRequest =
        serde_json::from_value(payload.clone()).context("start_payment payload")?;
    if request.cart_id.is_none() {
        request.cart_id = store.get_value(CART_ID).and_then(|v| v.decode::<String>());
    }

    match s.payments.start_payment(&request).await {
        Ok(outcome) => {
            s.analytics.track("payment", &serde_json::to_value(&outcome)?);
            store.update(PAYMENT_STATUS, serde_json::to_value(outcome)?);
        }
        Err(e) => s.backend_error(store, channel, PAYMENT_STATUS, &e),
    }
    Ok(())
}

fn write_cart(store: &StateStore, cart: &Cart) -> anyhow::Result<()> {
    store.update(CART_LINES, serde_json::to_value(&cart.lines)?);
    store.update(CART_ITEM_COUNT, cart.total_quantity);
    Ok(())
}
