//! Fingerprints - canonical cache keys for queries.

use std::fmt;

use crate::cursor::Cursor;
use crate::resource::Identity;

/// Canonical key over {resource type, operation kind, parameters}.
///
/// Two logically identical requests produce an identical fingerprint
/// regardless of how their parameters were assembled: identities and filter
/// sets are BTreeMap-backed, so their serialized forms are already sorted,
/// and cursor fields serialize in declaration order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint for a collection query.
    pub fn collection(cursor: &Cursor) -> Self {
        let params =
            serde_json::to_string(cursor).expect("cursor serialization should not fail");
        Fingerprint(format!("collection:{}:{}", cursor.resource_type, params))
    }

    /// Fingerprint for a single-resource query.
    pub fn resource(resource_type: &str, identity: &Identity) -> Self {
        Fingerprint(format!("resource:{}:{}", resource_type, identity.canonical()))
    }

    /// The canonical key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Direction;
    use crate::resource::Resource;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Thing {
        id: String,
    }

    impl Resource for Thing {
        const TYPE_NAME: &'static str = "things";
        fn identity(&self) -> Identity {
            Identity::new().with("id", &self.id)
        }
    }

    #[test]
    fn filter_order_does_not_change_fingerprint() {
        let a = Cursor::new::<Thing>("id", Direction::Ascending)
            .with_filter("color", &"red")
            .with_filter("shape", &"round");
        let b = Cursor::new::<Thing>("id", Direction::Ascending)
            .with_filter("shape", &"round")
            .with_filter("color", &"red");

        assert_eq!(Fingerprint::collection(&a), Fingerprint::collection(&b));
    }

    #[test]
    fn distinct_queries_get_distinct_fingerprints() {
        let a = Cursor::new::<Thing>("id", Direction::Ascending);
        let b = Cursor::new::<Thing>("id", Direction::Descending);
        assert_ne!(Fingerprint::collection(&a), Fingerprint::collection(&b));

        let identity = Identity::new().with("id", &"t1");
        assert_ne!(
            Fingerprint::collection(&a),
            Fingerprint::resource("things", &identity)
        );
    }

    #[test]
    fn identity_key_order_does_not_change_fingerprint() {
        let a = Identity::new().with("x", &1).with("y", &2);
        let b = Identity::new().with("y", &2).with("x", &1);
        assert_eq!(
            Fingerprint::resource("things", &a),
            Fingerprint::resource("things", &b)
        );
    }
}
