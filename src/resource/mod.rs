//! Resources - typed entities, identities, and change events.
//!
//! A [`Resource`] is an entity of a named type whose identity is a fixed
//! subset of its attributes. The cache core moves resources across its seams
//! as typed structs; attribute-level work (partial updates, ordering-key
//! comparison, identity matching) goes through the serde representation, so
//! the actual (de)serialization rules stay with the caller's types.
//!
//! ## Example
//!
//! ```ignore
//! use synced_rust::Resource;
//!
//! #[derive(Serialize, Deserialize, Clone, Resource)]
//! #[resource(type_name = "tasks")]
//! struct Task {
//!     #[resource(key)]
//!     pub id: String,
//!     pub title: String,
//!     pub created_at: u64,
//! }
//! ```

mod change;
mod identity;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt;

pub use change::ResourceChange;
pub use identity::Identity;

/// Canonical attribute representation: a JSON object of scalar values.
///
/// Partial updates and wire payloads travel as attribute maps; typed structs
/// enter and leave through serde at the API boundary.
pub type AttrMap = serde_json::Map<String, Value>;

/// Trait for entities managed by the cache core.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The resource type name (e.g., "tasks", "user_profiles").
    /// Change events and query fingerprints are scoped by this name.
    const TYPE_NAME: &'static str;

    /// Returns the identity of this instance: the key attributes that
    /// uniquely address it within the resource type.
    fn identity(&self) -> Identity;

    /// Look up a single attribute by name through the serde representation.
    ///
    /// Returns None for unknown attributes and for resources that do not
    /// serialize to an object.
    fn attr(&self, name: &str) -> Option<Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.get(name).cloned(),
            _ => None,
        }
    }
}

/// Error converting a resource to or from its attribute representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrError {
    /// The resource did not serialize to a JSON object.
    NotAnObject { resource_type: String },
    /// The external serializer rejected the value.
    Serde(String),
}

impl fmt::Display for AttrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrError::NotAnObject { resource_type } => {
                write!(f, "resource {} did not serialize to an object", resource_type)
            }
            AttrError::Serde(msg) => write!(f, "attribute serialization error: {}", msg),
        }
    }
}

impl std::error::Error for AttrError {}

/// Serialize a resource into its canonical attribute map.
pub fn attrs_of<R: Resource>(resource: &R) -> Result<AttrMap, AttrError> {
    match serde_json::to_value(resource) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AttrError::NotAnObject {
            resource_type: R::TYPE_NAME.to_string(),
        }),
        Err(e) => Err(AttrError::Serde(e.to_string())),
    }
}

/// Deserialize a resource from its canonical attribute map.
pub fn resource_from_attrs<R: Resource>(attrs: &AttrMap) -> Result<R, AttrError> {
    serde_json::from_value(Value::Object(attrs.clone()))
        .map_err(|e| AttrError::Serde(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        id: String,
        title: String,
        rank: i64,
    }

    impl Resource for Doc {
        const TYPE_NAME: &'static str = "docs";
        fn identity(&self) -> Identity {
            let mut identity = Identity::new();
            identity.set("id", &self.id);
            identity
        }
    }

    #[test]
    fn attr_lookup() {
        let doc = Doc {
            id: "d1".into(),
            title: "hello".into(),
            rank: 3,
        };

        assert_eq!(doc.attr("title"), Some(Value::String("hello".into())));
        assert_eq!(doc.attr("rank"), Some(Value::from(3)));
        assert_eq!(doc.attr("missing"), None);
    }

    #[test]
    fn attrs_round_trip() {
        let doc = Doc {
            id: "d1".into(),
            title: "hello".into(),
            rank: 3,
        };

        let attrs = attrs_of(&doc).unwrap();
        let back: Doc = resource_from_attrs(&attrs).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn identity_from_resource() {
        let doc = Doc {
            id: "d1".into(),
            title: "hello".into(),
            rank: 3,
        };

        let identity = doc.identity();
        assert_eq!(identity.get("id"), Some(&Value::String("d1".into())));
    }
}
