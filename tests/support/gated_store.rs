use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use synced_rust::{
    AttrMap, Cursor, Identity, InMemoryStore, Page, Resource, StoreError, Versioned,
    VersionedStore,
};

/// Store wrapper that parks `update` calls on a gate keyed by the caller's
/// expected version, so a test can keep two mutations in flight and settle
/// them in a chosen order.
pub struct GatedStore {
    inner: InMemoryStore,
    gates: Mutex<HashMap<u64, Arc<Notify>>>,
}

impl GatedStore {
    pub fn new(inner: InMemoryStore) -> Self {
        GatedStore {
            inner,
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Install a gate for updates carrying this expected version. The
    /// returned handle releases one parked call per `notify_one`.
    pub fn gate(&self, expected_version: u64) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(expected_version, Arc::clone(&notify));
        notify
    }

    fn gate_for(&self, expected_version: u64) -> Option<Arc<Notify>> {
        self.gates.lock().unwrap().get(&expected_version).cloned()
    }
}

#[async_trait]
impl VersionedStore for GatedStore {
    async fn retrieve<R: Resource>(&self, identity: &Identity) -> Result<Versioned<R>, StoreError> {
        self.inner.retrieve(identity).await
    }

    async fn create<R: Resource>(&self, resource: &R) -> Result<Versioned<R>, StoreError> {
        self.inner.create(resource).await
    }

    async fn replace<R: Resource>(
        &self,
        resource: &R,
        expected_version: u64,
    ) -> Result<Versioned<R>, StoreError> {
        self.inner.replace(resource, expected_version).await
    }

    async fn update<R: Resource>(
        &self,
        identity: &Identity,
        partial: &AttrMap,
        expected_version: u64,
    ) -> Result<Versioned<R>, StoreError> {
        if let Some(gate) = self.gate_for(expected_version) {
            gate.notified().await;
        }
        self.inner.update(identity, partial, expected_version).await
    }

    async fn destroy<R: Resource>(
        &self,
        identity: &Identity,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        self.inner.destroy::<R>(identity, expected_version).await
    }

    async fn list<R: Resource>(&self, cursor: &Cursor) -> Result<Page<R>, StoreError> {
        self.inner.list(cursor).await
    }
}
