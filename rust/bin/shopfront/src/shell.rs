//! App shell: wires config, adapters, the bridge and deep links together.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::info;

use shopfront_bridge::{
    Bridge, DeepLinkDispatcher, DispatchReport, LinkStatus, Navigator, OwnerId, QueryParams, Route,
    RouteTable,
};
use shopfront_commerce::{
    GraphQLClient, NoAuth, StaticToken, Storefront, StorefrontApi, TokenHeader, TokenSource,
};

use crate::adapters::{Analytics, DummyPayments, OfflineStorefront};
use crate::config::AppConfig;
use crate::handlers::{self, Services};
use crate::navigation::StoreNavigator;
use crate::widget::CartBadge;

pub const PAGE_SERVICE_KEY: &str = "ui/page_service";

/// Pick the storefront the config asks for.
pub fn storefront(config: &AppConfig) -> Arc<dyn StorefrontApi> {
    if !config.is_online() {
        info!("no commerce endpoint configured, using offline catalog");
        return Arc::new(OfflineStorefront::new());
    }
    let commerce = &config.commerce;
    let token_source: Arc<dyn TokenSource> = if commerce.token.is_empty() {
        Arc::new(NoAuth)
    } else {
        Arc::new(StaticToken::new(commerce.token.clone()))
    };
    let client = GraphQLClient::new(
        commerce.endpoint.trim(),
        token_source,
        TokenHeader::from_config(&commerce.token_header),
    );
    info!(endpoint = client.endpoint(), "commerce backend configured");
    Arc::new(Storefront::new(client))
}

/// Segment table: the built-in routes plus configured pages.
pub fn route_table(config: &AppConfig) -> RouteTable {
    let mut table = RouteTable::default();
    for (segment, page) in &config.deep_link.routes {
        table.insert(segment, Route::Page(page.clone()));
    }
    table
}

pub struct Shell {
    bridge: Arc<Bridge>,
    links: DeepLinkDispatcher,
    initial_route: Route,
    badge: Option<CartBadge>,
}

impl Shell {
    pub fn build(config: &AppConfig, analytics: Arc<dyn Analytics>) -> Self {
        let services = Services {
            storefront: storefront(config),
            analytics,
            payments: Arc::new(DummyPayments::new()),
        };
        Self::with_services(config, services)
    }

    pub fn with_services(config: &AppConfig, services: Services) -> Self {
        let bridge = Arc::new(Bridge::new());
        handlers::register(&bridge, Arc::new(services));

        if !config.ui.page_service.is_empty() {
            bridge.update(PAGE_SERVICE_KEY, config.ui.page_service.clone());
        }
        let initial_route = if config.ui.initial_page.is_empty() {
            Route::Home
        } else {
            Route::Page(config.ui.initial_page.clone())
        };

        let links = DeepLinkDispatcher::new(
            route_table(config),
            &config.deep_link.scheme,
            config.deep_link.hosts.clone(),
        );

        Self {
            bridge,
            links,
            initial_route,
            badge: None,
        }
    }

    /// First frame: mount the widget, show the initial route, then replay
    /// any links that arrived during launch. Returns how many were replayed.
    pub fn start(&mut self) -> usize {
        if self.badge.is_none() {
            self.badge = Some(CartBadge::mount(&self.bridge));
        }
        let navigator = Arc::new(StoreNavigator::new(Arc::clone(self.bridge.store())));
        navigator.navigate(&self.initial_route, &QueryParams::empty());
        self.links.attach(navigator)
    }

    /// Current cart badge text, once the shell has started.
    pub fn badge_label(&self) -> Option<String> {
        self.badge.as_ref().and_then(CartBadge::label)
    }

    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }

    pub async fn emit(&self, channel: &str, payload: Value) -> DispatchReport {
        self.bridge.dispatch(channel, payload).await
    }

    pub fn open(&self, uri: &str) -> LinkStatus {
        self.links.open(uri)
    }

    pub fn render(&self, template: &str) -> String {
        self.bridge.render(template)
    }

    /// The whole store as one JSON object.
    pub fn snapshot_json(&self) -> Value {
        let map: Map<String, Value> = self
            .bridge
            .snapshot()
            .into_iter()
            .map(|(k, v)| (k, v.as_json().clone()))
            .collect();
        Value::Object(map)
    }

    /// Tear down in reverse order. Returns subscriptions still live
    /// afterwards, which should be zero.
    pub fn shutdown(mut self) -> usize {
        self.links.detach();
        if let Some(badge) = self.badge.take() {
            badge.unmount();
        }
        // App-lifetime handlers are registered under the root owner.
        self.bridge.remove_all_for_owner(OwnerId::ROOT);
        let leaked = self.bridge.live_subscriptions();
        info!(leaked, "shell shut down");
        leaked
    }
}
