//! StoreTransport - serves fetches straight from a versioned store.
//!
//! Lets a session run entirely in-process: tests, demos and offline
//! fixtures point the read side at the same store the write side mutates.

use async_trait::async_trait;

use crate::cursor::{Cursor, Page};
use crate::resource::{Identity, Resource};
use crate::store::{StoreError, VersionedStore};

use super::{Transport, TransportError};

/// Transport adapter over any [`VersionedStore`].
#[derive(Clone)]
pub struct StoreTransport<S> {
    store: S,
}

impl<S> StoreTransport<S> {
    /// Wrap a store.
    pub fn new(store: S) -> Self {
        StoreTransport { store }
    }

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

fn to_transport_error(err: StoreError) -> TransportError {
    match err {
        StoreError::NotFound { .. } => TransportError::NotFound,
        other => TransportError::Failure(other.to_string()),
    }
}

#[async_trait]
impl<S: VersionedStore> Transport for StoreTransport<S> {
    async fn fetch_resource<R: Resource>(&self, identity: &Identity) -> Result<R, TransportError> {
        self.store
            .retrieve::<R>(identity)
            .await
            .map(|versioned| versioned.data)
            .map_err(to_transport_error)
    }

    async fn fetch_page<R: Resource>(&self, cursor: &Cursor) -> Result<Page<R>, TransportError> {
        self.store
            .list::<R>(cursor)
            .await
            .map_err(to_transport_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Direction;
    use crate::store::InMemoryStore;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Widget {
        id: String,
        size: u32,
    }

    impl Resource for Widget {
        const TYPE_NAME: &'static str = "widgets";
        fn identity(&self) -> Identity {
            Identity::new().with("id", &self.id)
        }
    }

    #[tokio::test]
    async fn fetches_resource_from_store() {
        let store = InMemoryStore::new();
        store
            .create(&Widget {
                id: "w1".into(),
                size: 3,
            })
            .await
            .unwrap();

        let transport = StoreTransport::new(store);
        let widget: Widget = transport
            .fetch_resource(&Identity::new().with("id", &"w1"))
            .await
            .unwrap();
        assert_eq!(widget.size, 3);
    }

    #[tokio::test]
    async fn missing_resource_is_not_found() {
        let transport = StoreTransport::new(InMemoryStore::new());
        let err = transport
            .fetch_resource::<Widget>(&Identity::new().with("id", &"nope"))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::NotFound);
    }

    #[tokio::test]
    async fn fetches_page_from_store() {
        let store = InMemoryStore::new();
        for (id, size) in [("w1", 2), ("w2", 1)] {
            store
                .create(&Widget {
                    id: id.into(),
                    size,
                })
                .await
                .unwrap();
        }

        let transport = StoreTransport::new(store);
        let page = transport
            .fetch_page::<Widget>(&Cursor::new::<Widget>("size", Direction::Ascending))
            .await
            .unwrap();

        assert!(page.is_complete());
        let ids: Vec<&str> = page.items.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["w2", "w1"]);
    }
}
