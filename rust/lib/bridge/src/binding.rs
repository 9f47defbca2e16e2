//! `{{ ... }}` interpolation for text bound to the state store.
//!
//! A placeholder holds a dotted path. The longest dotted prefix that names
//! a store key selects the entry; the remaining segments walk into its JSON
//! (object fields, array indices). `{{ cart.lines.0.title }}` therefore
//! reads key `cart` and then `lines[0].title`, unless a key literally
//! named `cart.lines` exists.
//!
//! Unresolvable placeholders render as the empty string. An unterminated
//! `{{` is left in the output as-is.

use serde_json::Value;

use crate::store::StateStore;
use crate::value::display_json;

/// Render `template`, substituting every placeholder from `store`.
pub fn render(template: &str, store: &StateStore) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            out.push_str(&rest[open..]);
            return out;
        };
        let path = after_open[..close].trim();
        if let Some(value) = resolve(path, store) {
            out.push_str(&display_json(&value));
        }
        rest = &after_open[close + 2..];
    }

    out.push_str(rest);
    out
}

/// Resolve a dotted binding path against the store.
pub fn resolve(path: &str, store: &StateStore) -> Option<Value> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return None;
    }

    for split in (1..=segments.len()).rev() {
        let key = segments[..split].join(".");
        if let Some(entry) = store.get_value(&key) {
            return entry.lookup(segments[split..].iter().copied()).cloned();
        }
    }
    None
}
