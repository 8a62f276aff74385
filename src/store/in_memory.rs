//! InMemoryStore - HashMap-backed versioned store for testing and fixtures.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::debug;

use crate::cursor::{scalar_cmp, Cursor, Direction, Page};
use crate::resource::{attrs_of, resource_from_attrs, AttrMap, Identity, Resource};

use super::{StoreError, Versioned, VersionedStore};

/// Internal stored representation of a resource.
struct StoredResource {
    attrs: AttrMap,
    version: u64,
}

/// In-memory versioned store backed by a HashMap.
///
/// Storage key is `"TYPE:identity"`. Clone-friendly via Arc. The `list`
/// implementation paginates on the ordering attribute with an exclusive
/// `since` bound, which assumes ordering values are distinct within one
/// query; equal-key rows straddling a page boundary are not re-fetched.
#[derive(Clone)]
pub struct InMemoryStore {
    storage: Arc<RwLock<HashMap<String, StoredResource>>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        InMemoryStore {
            storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn make_key(resource_type: &str, identity: &Identity) -> String {
        format!("{}:{}", resource_type, identity.canonical())
    }

    fn not_found<R: Resource>(identity: &Identity) -> StoreError {
        StoreError::NotFound {
            resource_type: R::TYPE_NAME.to_string(),
            identity: identity.canonical(),
        }
    }
}

#[async_trait]
impl VersionedStore for InMemoryStore {
    async fn retrieve<R: Resource>(&self, identity: &Identity) -> Result<Versioned<R>, StoreError> {
        let key = Self::make_key(R::TYPE_NAME, identity);
        let storage = self
            .storage
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".into()))?;

        let stored = storage.get(&key).ok_or_else(|| Self::not_found::<R>(identity))?;
        let data: R = resource_from_attrs(&stored.attrs)
            .map_err(|e| StoreError::Validation(e.to_string()))?;

        Ok(Versioned {
            data,
            version: stored.version,
        })
    }

    async fn create<R: Resource>(&self, resource: &R) -> Result<Versioned<R>, StoreError> {
        let identity = resource.identity();
        let key = Self::make_key(R::TYPE_NAME, &identity);
        let attrs = attrs_of(resource).map_err(|e| StoreError::Validation(e.to_string()))?;

        let mut storage = self
            .storage
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".into()))?;

        if storage.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                resource_type: R::TYPE_NAME.to_string(),
                identity: identity.canonical(),
            });
        }

        storage.insert(key, StoredResource { attrs, version: 1 });

        Ok(Versioned {
            data: resource.clone(),
            version: 1,
        })
    }

    async fn replace<R: Resource>(
        &self,
        resource: &R,
        expected_version: u64,
    ) -> Result<Versioned<R>, StoreError> {
        let identity = resource.identity();
        let key = Self::make_key(R::TYPE_NAME, &identity);
        let attrs = attrs_of(resource).map_err(|e| StoreError::Validation(e.to_string()))?;

        let mut storage = self
            .storage
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".into()))?;

        let stored = storage
            .get_mut(&key)
            .ok_or_else(|| Self::not_found::<R>(&identity))?;

        if stored.version != expected_version {
            return Err(StoreError::VersionConflict {
                resource_type: R::TYPE_NAME.to_string(),
                identity: identity.canonical(),
                expected: expected_version,
                actual: stored.version,
            });
        }

        stored.attrs = attrs;
        stored.version += 1;
        let version = stored.version;

        Ok(Versioned {
            data: resource.clone(),
            version,
        })
    }

    async fn update<R: Resource>(
        &self,
        identity: &Identity,
        partial: &AttrMap,
        expected_version: u64,
    ) -> Result<Versioned<R>, StoreError> {
        let key = Self::make_key(R::TYPE_NAME, identity);

        let mut storage = self
            .storage
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".into()))?;

        let stored = storage
            .get_mut(&key)
            .ok_or_else(|| Self::not_found::<R>(identity))?;

        if stored.version != expected_version {
            return Err(StoreError::VersionConflict {
                resource_type: R::TYPE_NAME.to_string(),
                identity: identity.canonical(),
                expected: expected_version,
                actual: stored.version,
            });
        }

        let mut merged = stored.attrs.clone();
        for (attr, value) in partial {
            merged.insert(attr.clone(), value.clone());
        }

        // The merged document must still deserialize to the resource type.
        let data: R =
            resource_from_attrs(&merged).map_err(|e| StoreError::Validation(e.to_string()))?;

        stored.attrs = merged;
        stored.version += 1;
        let version = stored.version;

        Ok(Versioned { data, version })
    }

    async fn destroy<R: Resource>(
        &self,
        identity: &Identity,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let key = Self::make_key(R::TYPE_NAME, identity);

        let mut storage = self
            .storage
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".into()))?;

        let stored = storage
            .get(&key)
            .ok_or_else(|| Self::not_found::<R>(identity))?;

        if stored.version != expected_version {
            return Err(StoreError::VersionConflict {
                resource_type: R::TYPE_NAME.to_string(),
                identity: identity.canonical(),
                expected: expected_version,
                actual: stored.version,
            });
        }

        storage.remove(&key);
        Ok(())
    }

    async fn list<R: Resource>(&self, cursor: &Cursor) -> Result<Page<R>, StoreError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".into()))?;

        let prefix = format!("{}:", R::TYPE_NAME);
        let mut rows: Vec<(&String, &StoredResource)> = storage
            .iter()
            .filter(|(key, stored)| key.starts_with(&prefix) && cursor.accepts(&stored.attrs))
            .collect();

        rows.sort_by(|(key_a, a), (key_b, b)| {
            let null = Value::Null;
            let va = a.attrs.get(&cursor.ordering).unwrap_or(&null);
            let vb = b.attrs.get(&cursor.ordering).unwrap_or(&null);
            let cmp = match cursor.direction {
                Direction::Ascending => scalar_cmp(va, vb),
                Direction::Descending => scalar_cmp(vb, va),
            };
            // Storage key as a deterministic tie-break; HashMap iteration
            // order must not leak into page boundaries.
            if cmp == Ordering::Equal {
                key_a.cmp(key_b)
            } else {
                cmp
            }
        });

        let mut items = Vec::new();
        for (_, stored) in rows.iter().take(cursor.page_size) {
            match resource_from_attrs::<R>(&stored.attrs) {
                Ok(item) => items.push(item),
                Err(e) => {
                    debug!(resource_type = R::TYPE_NAME, error = %e, "skipping undecodable row");
                }
            }
        }

        let next = if rows.len() > cursor.page_size {
            items
                .last()
                .and_then(|last| last.attr(&cursor.ordering))
                .map(|since| cursor.clone().with_since(&since))
        } else {
            None
        };

        Ok(Page { items, next })
    }
}
