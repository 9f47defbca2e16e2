use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A reference-counted JSON value held by the state store.
///
/// Clone is an atomic increment; every reader of a key shares the same
/// underlying `serde_json::Value`.
#[derive(Clone, PartialEq)]
pub struct StateValue {
    inner: Arc<Value>,
}

impl StateValue {
    /// Wrap anything convertible into a JSON value.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            inner: Arc::new(value.into()),
        }
    }

    /// The JSON `null` value. Written by `StateStore::clear`.
    pub fn null() -> Self {
        Self::new(Value::Null)
    }

    /// Serialize a typed value into a StateValue.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::to_value(value)?))
    }

    /// Borrow the underlying JSON.
    pub fn as_json(&self) -> &Value {
        &self.inner
    }

    /// Decode into a typed value. Returns `None` if the shape doesn't fit.
    pub fn decode<T: DeserializeOwned>(&self) -> Option<T> {
        T::deserialize(self.inner.as_ref()).ok()
    }

    pub fn is_null(&self) -> bool {
        self.inner.is_null()
    }

    /// Walk into the value along object fields / array indices.
    ///
    /// An empty path returns the value itself.
    pub fn lookup<'a, I>(&self, path: I) -> Option<&Value>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut current = self.inner.as_ref();
        for segment in path {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Number of strong references to the shared JSON.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl From<Value> for StateValue {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StateValue").field(&self.inner).finish()
    }
}

/// Stringify a JSON value the way UI bindings display it.
///
/// Strings render without quotes, `null` renders empty, everything else
/// renders as compact JSON.
pub fn display_json(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Handle for a store subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

/// Handle for a channel handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub(crate) u64);

/// Identifies the component that owns a set of registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(pub(crate) u64);

impl OwnerId {
    /// Owner for registrations made directly on the bridge, outside any scope.
    pub const ROOT: OwnerId = OwnerId(0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn new_from_primitives() {
        assert_eq!(StateValue::new(42).as_json(), &json!(42));
        assert_eq!(StateValue::new("hi").as_json(), &json!("hi"));
        assert_eq!(StateValue::new(true).as_json(), &json!(true));
    }

    #[test]
    fn null_is_null() {
        assert!(StateValue::null().is_null());
        assert!(!StateValue::new(0).is_null());
    }

    #[test]
    fn decode_struct() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Session {
            user: String,
            premium: bool,
        }

        let v = StateValue::new(json!({ "user": "ana", "premium": true }));
        assert_eq!(
            v.decode::<Session>(),
            Some(Session {
                user: "ana".into(),
                premium: true
            })
        );
    }

    #[test]
    fn decode_wrong_shape_returns_none() {
        let v = StateValue::new("not a number");
        assert_eq!(v.decode::<u32>(), None);
    }

    #[test]
    fn from_serialize_roundtrips_fields() {
        #[derive(Serialize)]
        struct Line {
            sku: &'static str,
            qty: u32,
        }
        let v = StateValue::from_serialize(&Line { sku: "p1", qty: 2 }).unwrap();
        assert_eq!(v.as_json(), &json!({ "sku": "p1", "qty": 2 }));
    }

    #[test]
    fn lookup_walks_objects_and_arrays() {
        let v = StateValue::new(json!({ "lines": [{ "title": "Mug" }] }));
        assert_eq!(v.lookup(["lines", "0", "title"]), Some(&json!("Mug")));
        assert_eq!(v.lookup(["lines", "7"]), None);
        assert_eq!(v.lookup(["lines", "x"]), None);
        assert_eq!(v.lookup(Vec::<&str>::new()), Some(&json!({ "lines": [{ "title": "Mug" }] })));
    }

    #[test]
    fn lookup_through_scalar_fails() {
        let v = StateValue::new(3);
        assert_eq!(v.lookup(["anything"]), None);
    }

    #[test]
    fn clone_shares_json() {
        let a = StateValue::new(json!({ "big": vec![0u8; 1024] }));
        let b = a.clone();
        assert_eq!(a.ref_count(), 2);
        assert!(std::ptr::eq(a.as_json(), b.as_json()));
    }

    #[test]
    fn display_json_forms() {
        assert_eq!(display_json(&json!("plain")), "plain");
        assert_eq!(display_json(&json!(3)), "3");
        assert_eq!(display_json(&json!(null)), "");
        assert_eq!(display_json(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn root_owner_is_zero() {
        assert_eq!(OwnerId::ROOT, OwnerId(0));
        assert_ne!(OwnerId::ROOT, OwnerId(1));
    }

    fn _assert_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<StateValue>();
        assert_sync::<StateValue>();
    }
}
