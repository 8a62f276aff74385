//! Identity - the key attributes that address one resource instance.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::AttrMap;

/// A mapping from key attribute names to scalar values that uniquely
/// addresses one resource instance within a resource type.
///
/// Backed by a `BTreeMap`, so two identities built from the same attributes
/// serialize identically regardless of insertion order. Immutable once read
/// off a resource; `set` exists for construction only.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity(BTreeMap<String, Value>);

impl Identity {
    /// Create an empty identity.
    pub fn new() -> Self {
        Identity(BTreeMap::new())
    }

    /// Set a key attribute. Values that the serializer rejects are recorded
    /// as null; identity keys are scalars in practice.
    pub fn set<V: Serialize>(&mut self, key: &str, value: &V) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.0.insert(key.to_string(), value);
    }

    /// Builder-style `set`.
    pub fn with<V: Serialize>(mut self, key: &str, value: &V) -> Self {
        self.set(key, value);
        self
    }

    /// Get a key attribute value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The key attribute names, in canonical (sorted) order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// True if no key attributes have been set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if the given attribute map carries every key attribute of this
    /// identity with an equal value.
    pub fn matches(&self, attrs: &AttrMap) -> bool {
        !self.0.is_empty()
            && self
                .0
                .iter()
                .all(|(key, value)| attrs.get(key) == Some(value))
    }

    /// Canonical text form, used in fingerprints and diagnostics.
    pub fn canonical(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_is_order_independent() {
        let a = Identity::new().with("channel", &"general").with("index", &7);
        let b = Identity::new().with("index", &7).with("channel", &"general");

        assert_eq!(a, b);
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn matches_attr_map() {
        let identity = Identity::new().with("id", &"x1");

        let mut attrs = AttrMap::new();
        attrs.insert("id".into(), Value::String("x1".into()));
        attrs.insert("name".into(), Value::String("anything".into()));
        assert!(identity.matches(&attrs));

        attrs.insert("id".into(), Value::String("x2".into()));
        assert!(!identity.matches(&attrs));
    }

    #[test]
    fn empty_identity_matches_nothing() {
        let identity = Identity::new();
        let attrs = AttrMap::new();
        assert!(!identity.matches(&attrs));
    }
}
