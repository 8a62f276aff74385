//! ResourceChange - the event variant delivered on the change bus.

use serde::{Deserialize, Serialize};

use super::{attrs_of, AttrError, AttrMap, Identity, Resource};

/// A change to one resource instance, tagged with its resource type name.
///
/// Changes are interpreted strictly in delivery order; the engine never
/// reorders them. A removal erases whatever the view held for the identity,
/// so stale additions or updates delivered before it simply stop mattering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ResourceChange {
    /// A new resource now exists.
    Addition {
        resource_type: String,
        identity: Identity,
        resource: AttrMap,
    },
    /// An existing resource's attributes changed (partial attribute set).
    Update {
        resource_type: String,
        identity: Identity,
        partial: AttrMap,
    },
    /// The resource no longer exists.
    Removal {
        resource_type: String,
        identity: Identity,
    },
}

impl ResourceChange {
    /// Build an addition event from a typed resource.
    pub fn addition<R: Resource>(resource: &R) -> Result<Self, AttrError> {
        Ok(ResourceChange::Addition {
            resource_type: R::TYPE_NAME.to_string(),
            identity: resource.identity(),
            resource: attrs_of(resource)?,
        })
    }

    /// Build an update event carrying only the changed attributes.
    pub fn update<R: Resource>(identity: Identity, partial: AttrMap) -> Self {
        ResourceChange::Update {
            resource_type: R::TYPE_NAME.to_string(),
            identity,
            partial,
        }
    }

    /// Build a removal event.
    pub fn removal<R: Resource>(identity: Identity) -> Self {
        ResourceChange::Removal {
            resource_type: R::TYPE_NAME.to_string(),
            identity,
        }
    }

    /// The resource type this change applies to.
    pub fn resource_type(&self) -> &str {
        match self {
            ResourceChange::Addition { resource_type, .. }
            | ResourceChange::Update { resource_type, .. }
            | ResourceChange::Removal { resource_type, .. } => resource_type,
        }
    }

    /// The identity this change applies to.
    pub fn identity(&self) -> &Identity {
        match self {
            ResourceChange::Addition { identity, .. }
            | ResourceChange::Update { identity, .. }
            | ResourceChange::Removal { identity, .. } => identity,
        }
    }

    /// Short tag for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ResourceChange::Addition { .. } => "addition",
            ResourceChange::Update { .. } => "update",
            ResourceChange::Removal { .. } => "removal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        body: String,
    }

    impl Resource for Note {
        const TYPE_NAME: &'static str = "notes";
        fn identity(&self) -> Identity {
            Identity::new().with("id", &self.id)
        }
    }

    #[test]
    fn addition_carries_full_attrs() {
        let note = Note {
            id: "n1".into(),
            body: "hi".into(),
        };

        let change = ResourceChange::addition(&note).unwrap();
        assert_eq!(change.resource_type(), "notes");
        assert_eq!(change.kind(), "addition");
        match change {
            ResourceChange::Addition { resource, .. } => {
                assert_eq!(resource.get("body"), Some(&Value::String("hi".into())));
            }
            _ => panic!("expected addition"),
        }
    }

    #[test]
    fn update_and_removal_accessors() {
        let identity = Identity::new().with("id", &"n1");

        let mut partial = AttrMap::new();
        partial.insert("body".into(), Value::String("edited".into()));

        let update = ResourceChange::update::<Note>(identity.clone(), partial);
        assert_eq!(update.kind(), "update");
        assert_eq!(update.identity(), &identity);

        let removal = ResourceChange::removal::<Note>(identity.clone());
        assert_eq!(removal.kind(), "removal");
        assert_eq!(removal.resource_type(), "notes");
    }
}
