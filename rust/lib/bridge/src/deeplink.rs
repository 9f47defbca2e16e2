//! Deep-link dispatch.
//!
//! An incoming link's first path segment picks a [`Route`] from a
//! [`RouteTable`]. Custom-scheme links (`app://cart`) and universal links
//! (`https://shop.example/cart`) resolve through the same table. Anything
//! that doesn't resolve lands on Home with a user-visible notice.
//!
//! Links are handled one at a time. Links that arrive before a
//! [`Navigator`] is attached (the app has not drawn its first frame yet)
//! are queued and replayed in arrival order on `attach`.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

// ── Routes ──

/// A navigation target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", content = "page", rename_all = "snake_case")]
pub enum Route {
    Home,
    Cart,
    /// A server-driven page, by page id.
    Page(String),
}

impl Route {
    pub fn name(&self) -> &str {
        match self {
            Route::Home => "home",
            Route::Cart => "cart",
            Route::Page(id) => id,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// First-segment → route lookup. Segments are matched case-insensitively.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: HashMap<String, Route>,
}

impl RouteTable {
    /// An empty table. Only the bare root link resolves (to Home).
    pub fn empty() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Add or replace a segment mapping.
    pub fn with(mut self, segment: &str, route: Route) -> Self {
        self.insert(segment, route);
        self
    }

    pub fn insert(&mut self, segment: &str, route: Route) {
        self.routes.insert(segment.to_ascii_lowercase(), route);
    }

    pub fn lookup(&self, segment: &str) -> Option<&Route> {
        self.routes.get(&segment.to_ascii_lowercase())
    }
}

impl Default for RouteTable {
    /// `home` → Home, `cart` → Cart.
    fn default() -> Self {
        Self::empty()
            .with("home", Route::Home)
            .with("cart", Route::Cart)
    }
}

// ── QueryParams ──

/// A link's query string, kept verbatim for the handler to interpret.
///
/// Pairs are split on `&` and `=` but not percent-decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    raw: String,
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parse a query string (without the leading `?`).
    pub fn parse(query: &str) -> Self {
        let pairs = query
            .split('&')
            .filter(|s| !s.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (pair.to_string(), String::new()),
            })
            .collect();
        Self {
            raw: query.to_string(),
            pairs,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The original query string.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

// ── Parsing ──

/// Why a link could not be turned into a segment lookup.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("malformed link: {0}")]
    Malformed(#[from] url::ParseError),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("link host not handled by this app: {0}")]
    ForeignHost(String),
}

/// Outcome of resolving one link.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Route { route: Route, query: QueryParams },
    Unrecognized { uri: String, reason: String },
}

/// Result of handing a link to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkStatus {
    /// No navigator yet, or another link is being processed.
    Queued,
    Handled(Resolution),
}

/// Whatever can move the app between screens and show a passive notice.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &Route, query: &QueryParams);
    fn notify(&self, message: &str);
}

// ── Dispatcher ──

struct DispatchState {
    navigator: Option<Arc<dyn Navigator>>,
    pending: VecDeque<String>,
    draining: bool,
}

/// Turns incoming links into navigation, one at a time.
pub struct DeepLinkDispatcher {
    table: RouteTable,
    scheme: String,
    hosts: Vec<String>,
    state: Mutex<DispatchState>,
}

impl DeepLinkDispatcher {
    /// `scheme` is the app's custom scheme (`app`). `hosts` restricts which
    /// universal-link hosts are accepted; empty accepts any host.
    pub fn new(table: RouteTable, scheme: &str, hosts: Vec<String>) -> Self {
        Self {
            table,
            scheme: scheme.to_ascii_lowercase(),
            hosts,
            state: Mutex::new(DispatchState {
                navigator: None,
                pending: VecDeque::new(),
                draining: false,
            }),
        }
    }

    /// Extract `(first_segment, query)` from a link.
    pub fn parse(&self, uri: &str) -> Result<(String, QueryParams), LinkError> {
        let url = Url::parse(uri.trim())?;
        let query = QueryParams::parse(url.query().unwrap_or(""));

        let segment = match url.scheme() {
            "http" | "https" => {
                let host = url.host_str().unwrap_or("");
                if !self.hosts.is_empty()
                    && !self.hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
                {
                    return Err(LinkError::ForeignHost(host.to_string()));
                }
                first_segment(url.path())
            }
            scheme if scheme == self.scheme => match url.host_str() {
                // `app://cart/...` puts the first segment in the host slot.
                Some(host) if !host.is_empty() => host.to_string(),
                _ => first_segment(url.path()),
            },
            other => return Err(LinkError::UnsupportedScheme(other.to_string())),
        };
        Ok((segment, query))
    }

    /// Resolve a link against the route table without navigating.
    pub fn resolve(&self, uri: &str) -> Resolution {
        match self.parse(uri) {
            Ok((segment, query)) if segment.is_empty() => Resolution::Route {
                route: Route::Home,
                query,
            },
            Ok((segment, query)) => match self.table.lookup(&segment) {
                Some(route) => Resolution::Route {
                    route: route.clone(),
                    query,
                },
                None => Resolution::Unrecognized {
                    uri: uri.to_string(),
                    reason: format!("no route for '{segment}'"),
                },
            },
            Err(e) => Resolution::Unrecognized {
                uri: uri.to_string(),
                reason: e.to_string(),
            },
        }
    }

    /// Handle an incoming link, or queue it if navigation isn't ready.
    pub fn open(&self, uri: &str) -> LinkStatus {
        let navigator = {
            let mut state = self.lock();
            match &state.navigator {
                Some(nav) if !state.draining && state.pending.is_empty() => {
                    let nav = Arc::clone(nav);
                    state.draining = true;
                    nav
                }
                _ => {
                    debug!(uri, "deep link queued");
                    state.pending.push_back(uri.to_string());
                    return LinkStatus::Queued;
                }
            }
        };

        let resolution = self.apply(navigator.as_ref(), uri);
        // Links opened re-entrantly by the navigator were queued; run them now.
        self.drain();
        LinkStatus::Handled(resolution)
    }

    /// Navigation is ready: replay queued links in arrival order.
    ///
    /// Returns how many queued links were processed. Called while links are
    /// already being processed, it swaps the navigator for the remaining ones
    /// and returns 0.
    pub fn attach(&self, navigator: Arc<dyn Navigator>) -> usize {
        {
            let mut state = self.lock();
            state.navigator = Some(navigator);
            if state.draining {
                return 0;
            }
            state.draining = true;
        }
        let drained = self.drain();
        info!(drained, "navigator attached");
        drained
    }

    /// Stop navigating; later links queue until the next `attach`.
    pub fn detach(&self) -> Option<Arc<dyn Navigator>> {
        self.lock().navigator.take()
    }

    /// Links waiting for a navigator.
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Apply queued links through whichever navigator is attached at each
    /// step. Stops early if the navigator goes away.
    fn drain(&self) -> usize {
        let mut processed = 0;
        loop {
            let (navigator, next) = {
                let mut state = self.lock();
                let Some(navigator) = state.navigator.clone() else {
                    state.draining = false;
                    break;
                };
                match state.pending.pop_front() {
                    Some(uri) => (navigator, uri),
                    None => {
                        state.draining = false;
                        break;
                    }
                }
            };
            self.apply(navigator.as_ref(), &next);
            processed += 1;
        }
        processed
    }

    fn apply(&self, navigator: &dyn Navigator, uri: &str) -> Resolution {
        let resolution = self.resolve(uri);
        match &resolution {
            Resolution::Route { route, query } => {
                debug!(uri, %route, "deep link resolved");
                navigator.navigate(route, query);
            }
            Resolution::Unrecognized { reason, .. } => {
                warn!(uri, reason = %reason, "unrecognized deep link");
                navigator.navigate(&Route::Home, &QueryParams::empty());
                navigator.notify(&format!("We couldn't open that link: {uri}"));
            }
        }
        resolution
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DispatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn first_segment(path: &str) -> String {
    path.split('/')
        .find(|s| !s.is_empty())
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingNavigator {
        events: Mutex<Vec<String>>,
    }

    impl RecordingNavigator {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, route: &Route, query: &QueryParams) {
            let entry = if query.is_empty() {
                format!("go:{route}")
            } else {
                format!("go:{route}?{}", query.raw())
            };
            self.events.lock().unwrap().push(entry);
        }

        fn notify(&self, _message: &str) {
            self.events.lock().unwrap().push("notice".to_string());
        }
    }

    fn dispatcher() -> DeepLinkDispatcher {
        DeepLinkDispatcher::new(RouteTable::default(), "app", Vec::new())
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    #[test]
    fn universal_and_custom_scheme_resolve_alike() {
        let d = dispatcher();
        let https = d.resolve("https://x/cart");
        let custom = d.resolve("app://cart");
        assert_eq!(https, custom);
        assert!(matches!(https, Resolution::Route { route: Route::Cart, .. }));
    }

    #[test]
    fn custom_scheme_without_authority() {
        let d = dispatcher();
        assert!(matches!(
            d.resolve("app:home"),
            Resolution::Route { route: Route::Home, .. }
        ));
    }

    #[test]
    fn segment_lookup_ignores_case_and_trailing_path() {
        let d = dispatcher();
        assert!(matches!(
            d.resolve("https://shop.example/CART/items/3"),
            Resolution::Route { route: Route::Cart, .. }
        ));
    }

    #[test]
    fn query_is_passed_through_verbatim() {
        let d = dispatcher();
        let Resolution::Route { query, .. } = d.resolve("app://cart?coupon=SAVE%2010&ref") else {
            panic!("expected a route");
        };
        assert_eq!(query.raw(), "coupon=SAVE%2010&ref");
        assert_eq!(query.get("coupon"), Some("SAVE%2010"));
        assert_eq!(query.get("ref"), Some(""));
    }

    #[test]
    fn bare_root_goes_home() {
        let d = dispatcher();
        assert!(matches!(
            d.resolve("https://shop.example/"),
            Resolution::Route { route: Route::Home, .. }
        ));
    }

    #[test]
    fn unknown_segment_is_unrecognized() {
        let d = dispatcher();
        assert!(matches!(
            d.resolve("https://x/unknown"),
            Resolution::Unrecognized { .. }
        ));
    }

    #[test]
    fn foreign_scheme_and_host_rejected() {
        let d = DeepLinkDispatcher::new(
            RouteTable::default(),
            "app",
            vec!["shop.example".to_string()],
        );
        assert!(matches!(d.parse("ftp://x/cart"), Err(LinkError::UnsupportedScheme(_))));
        assert!(matches!(d.parse("https://evil.example/cart"), Err(LinkError::ForeignHost(_))));
        assert!(d.parse("https://SHOP.example/cart").is_ok());
        assert!(matches!(d.parse("not a link"), Err(LinkError::Malformed(_))));
    }

    #[test]
    fn extra_pages_from_table() {
        let table = RouteTable::default().with("product", Route::Page("product_detail".into()));
        let d = DeepLinkDispatcher::new(table, "app", Vec::new());
        let Resolution::Route { route, query } = d.resolve("app://product?id=p1") else {
            panic!("expected a route");
        };
        assert_eq!(route, Route::Page("product_detail".into()));
        assert_eq!(query.get("id"), Some("p1"));
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    #[test]
    fn unrecognized_link_lands_home_with_notice() {
        let d = dispatcher();
        let nav = Arc::new(RecordingNavigator::default());
        d.attach(nav.clone());

        let status = d.open("https://x/unknown");
        assert!(matches!(status, LinkStatus::Handled(Resolution::Unrecognized { .. })));
        assert_eq!(nav.events(), vec!["go:home", "notice"]);
    }

    #[test]
    fn links_before_attach_are_queued_then_replayed_in_order() {
        let d = dispatcher();
        assert_eq!(d.open("app://cart"), LinkStatus::Queued);
        assert_eq!(d.open("https://x/home?tab=deals"), LinkStatus::Queued);
        assert_eq!(d.pending(), 2);

        let nav = Arc::new(RecordingNavigator::default());
        assert_eq!(d.attach(nav.clone()), 2);
        assert_eq!(d.pending(), 0);
        assert_eq!(nav.events(), vec!["go:cart", "go:home?tab=deals"]);
    }

    #[test]
    fn detach_queues_again() {
        let d = dispatcher();
        let nav = Arc::new(RecordingNavigator::default());
        d.attach(nav.clone());
        assert!(d.detach().is_some());
        assert_eq!(d.open("app://cart"), LinkStatus::Queued);
        assert!(nav.events().is_empty());
    }

    #[test]
    fn reentrant_link_runs_after_current_one() {
        struct Chaining {
            dispatcher: Mutex<Option<Arc<DeepLinkDispatcher>>>,
            inner: RecordingNavigator,
        }
        impl Navigator for Chaining {
            fn navigate(&self, route: &Route, query: &QueryParams) {
                self.inner.navigate(route, query);
                if *route == Route::Home {
                    if let Some(d) = self.dispatcher.lock().unwrap().as_ref() {
                        assert_eq!(d.open("app://cart"), LinkStatus::Queued);
                    }
                }
            }
            fn notify(&self, message: &str) {
                self.inner.notify(message);
            }
        }

        let d = Arc::new(dispatcher());
        let nav = Arc::new(Chaining {
            dispatcher: Mutex::new(Some(d.clone())),
            inner: RecordingNavigator::default(),
        });
        d.attach(nav.clone());
        d.open("app://home");
        assert_eq!(nav.inner.events(), vec!["go:home", "go:cart"]);
        // Break the Arc cycle.
        nav.dispatcher.lock().unwrap().take();
    }

    /// Records like `RecordingNavigator` and runs `on_cart` against the
    /// dispatcher whenever it lands on the cart.
    struct CartHook {
        dispatcher: Mutex<Option<Arc<DeepLinkDispatcher>>>,
        inner: RecordingNavigator,
        on_cart: Box<dyn Fn(&DeepLinkDispatcher) + Send + Sync>,
    }

    impl CartHook {
        fn new(
            d: &Arc<DeepLinkDispatcher>,
            on_cart: impl Fn(&DeepLinkDispatcher) + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                dispatcher: Mutex::new(Some(d.clone())),
                inner: RecordingNavigator::default(),
                on_cart: Box::new(on_cart),
            })
        }
    }

    impl Navigator for CartHook {
        fn navigate(&self, route: &Route, query: &QueryParams) {
            self.inner.navigate(route, query);
            if *route == Route::Cart {
                let d = self.dispatcher.lock().unwrap().clone();
                if let Some(d) = d {
                    (self.on_cart)(&d);
                }
            }
        }
        fn notify(&self, message: &str) {
            self.inner.notify(message);
        }
    }

    #[test]
    fn detach_during_replay_leaves_rest_queued() {
        let d = Arc::new(dispatcher());
        d.open("app://cart");
        d.open("app://home");
        d.open("app://cart?again");

        let first = CartHook::new(&d, |d| {
            d.detach();
        });
        assert_eq!(d.attach(first.clone()), 1);
        assert_eq!(first.inner.events(), vec!["go:cart"]);
        assert_eq!(d.pending(), 2);

        let second = Arc::new(RecordingNavigator::default());
        assert_eq!(d.attach(second.clone()), 2);
        assert_eq!(second.events(), vec!["go:home", "go:cart?again"]);
        assert_eq!(first.inner.events(), vec!["go:cart"]);
        first.dispatcher.lock().unwrap().take();
    }

    #[test]
    fn attach_during_replay_switches_navigator() {
        let d = Arc::new(dispatcher());
        d.open("app://cart");
        d.open("app://home");

        let second = Arc::new(RecordingNavigator::default());
        let handoff = second.clone();
        let first = CartHook::new(&d, move |d| {
            assert_eq!(d.attach(handoff.clone()), 0);
        });
        assert_eq!(d.attach(first.clone()), 2);
        assert_eq!(first.inner.events(), vec!["go:cart"]);
        assert_eq!(second.events(), vec!["go:home"]);
        assert_eq!(d.pending(), 0);

        // Later links go through the new navigator.
        assert!(matches!(d.open("app://home"), LinkStatus::Handled(_)));
        assert_eq!(second.events(), vec!["go:home", "go:home"]);
        first.dispatcher.lock().unwrap().take();
    }

    #[test]
    fn route_serializes_with_screen_tag() {
        assert_eq!(
            serde_json::to_value(Route::Cart).unwrap(),
            serde_json::json!({ "screen": "cart" })
        );
        assert_eq!(
            serde_json::to_value(Route::Page("promo".into())).unwrap(),
            serde_json::json!({ "screen": "page", "page": "promo" })
        );
    }

    #[test]
    fn query_params_parse() {
        let q = QueryParams::parse("a=1&b=2&&c");
        assert_eq!(q.get("a"), Some("1"));
        assert_eq!(q.get("c"), Some(""));
        assert_eq!(q.iter().count(), 3);
        assert!(QueryParams::empty().is_empty());
    }
}
