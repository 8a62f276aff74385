//! SyncSession - the assembled cache and synchronization engine.
//!
//! A session owns one change bus, one fingerprint table and one optimistic
//! mutation queue, and is handed its two collaborators: a [`Transport`] for
//! reads and a [`VersionedStore`] for writes. Sessions are independent;
//! create one per tenant or per test and nothing leaks between them.
//!
//! ## Example
//!
//! ```ignore
//! use synced_rust::{Cursor, Direction, InMemoryStore, StoreTransport, SyncSession};
//!
//! let store = InMemoryStore::new();
//! let session = SyncSession::new(StoreTransport::new(store.clone()), store);
//!
//! let tasks = session
//!     .collection::<Task>(Cursor::new::<Task>("created_at", Direction::Ascending))
//!     .await?;
//! tasks.observe(|items| println!("{} tasks", items.len()));
//!
//! // Optimistically visible at once; confirmed (or rolled back) when the
//! // store answers.
//! session.create(Task::new("write the report")).await?;
//! ```
//!
//! ## The optimistic mutation protocol
//!
//! Every mutating call follows four steps: (1) synthesize the change and
//! record it in the queue, re-deriving every matching live view so the edit
//! is visible immediately; (2) issue the real store call; (3) on success,
//! settle the record and publish the authoritative change built from the
//! store's returned resource; (4) on failure, settle the record and
//! re-derive the views from confirmed state plus the records still pending,
//! so observers revert before the error reaches the caller.
//!
//! Merging, fingerprint lookups and overlay application are synchronous and
//! run to completion; the session suspends only at transport and store
//! calls. Internal locks are ordered table → bus → artifact → queue and
//! never taken in reverse.

use std::sync::Arc;

use tracing::warn;

use crate::cache::{
    CacheShared, CollectionCore, ErasedArtifact, FetchError, Fingerprint, JoinOutcome,
    LiveCollection, LiveResource, ResourceCore,
};
use crate::cursor::Cursor;
use crate::resource::{attrs_of, AttrError, AttrMap, Identity, Resource, ResourceChange};
use crate::store::{StoreError, Versioned, VersionedStore};
use crate::transport::Transport;

/// One cache instance: shared live views over a transport and a versioned
/// store.
pub struct SyncSession<T, S> {
    transport: Arc<T>,
    store: Arc<S>,
    shared: Arc<CacheShared>,
}

impl<T, S> Clone for SyncSession<T, S> {
    fn clone(&self) -> Self {
        SyncSession {
            transport: Arc::clone(&self.transport),
            store: Arc::clone(&self.store),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Transport, S: VersionedStore> SyncSession<T, S> {
    /// Create a session over the given collaborators.
    pub fn new(transport: T, store: S) -> Self {
        SyncSession {
            transport: Arc::new(transport),
            store: Arc::new(store),
            shared: Arc::new(CacheShared::new()),
        }
    }

    /// Subscribe to a live collection for a cursor query.
    ///
    /// Concurrent first-time subscribers of the same fingerprint share one
    /// fetch; later subscribers join the cached artifact without any
    /// network traffic. Build the cursor with [`Cursor::new`] for `R` - a
    /// cursor naming a different resource type will not resolve.
    pub async fn collection<R: Resource>(
        &self,
        cursor: Cursor,
    ) -> Result<LiveCollection<R>, FetchError> {
        debug_assert_eq!(cursor.resource_type, R::TYPE_NAME);
        let fingerprint = Fingerprint::collection(&cursor);

        match self.shared.table.join(&fingerprint) {
            JoinOutcome::Existing(artifact) => Ok(LiveCollection::from_parts(
                Arc::clone(&self.shared),
                fingerprint,
                downcast_collection::<R>(artifact),
            )),

            JoinOutcome::Waiting(receiver) => {
                let artifact = receiver.await.map_err(|_| FetchError::Cancelled)??;
                Ok(LiveCollection::from_parts(
                    Arc::clone(&self.shared),
                    fingerprint,
                    downcast_collection::<R>(artifact),
                ))
            }

            JoinOutcome::Leading(guard) => {
                let page = match self.transport.fetch_page::<R>(&cursor).await {
                    Ok(page) => page,
                    Err(e) => {
                        let err = FetchError::from(e);
                        guard.fail(err.clone());
                        return Err(err);
                    }
                };

                let core = Arc::new(CollectionCore::new(cursor, page, &self.shared.queue));

                let bus_core = Arc::clone(&core);
                let bus_queue = Arc::clone(&self.shared.queue);
                let subscription = self.shared.bus.subscribe(R::TYPE_NAME, move |change| {
                    bus_core.apply_authoritative(change, &bus_queue);
                });

                let refresh_core = Arc::clone(&core);
                let refresh_queue = Arc::clone(&self.shared.queue);
                let refresh: Arc<dyn Fn() + Send + Sync> =
                    Arc::new(move || refresh_core.refresh(&refresh_queue));

                let erased: ErasedArtifact = Arc::clone(&core) as ErasedArtifact;
                match guard.succeed(erased, R::TYPE_NAME, subscription, refresh) {
                    Some(_) => Ok(LiveCollection::from_parts(
                        Arc::clone(&self.shared),
                        fingerprint,
                        core,
                    )),
                    None => {
                        // Nobody referenced the fingerprint by completion
                        // time; dispose instead of installing.
                        self.shared.bus.unsubscribe(subscription);
                        Err(FetchError::Cancelled)
                    }
                }
            }
        }
    }

    /// Subscribe to a live view of a single resource.
    pub async fn resource<R: Resource>(
        &self,
        identity: Identity,
    ) -> Result<LiveResource<R>, FetchError> {
        let fingerprint = Fingerprint::resource(R::TYPE_NAME, &identity);

        match self.shared.table.join(&fingerprint) {
            JoinOutcome::Existing(artifact) => Ok(LiveResource::from_parts(
                Arc::clone(&self.shared),
                fingerprint,
                downcast_resource::<R>(artifact),
            )),

            JoinOutcome::Waiting(receiver) => {
                let artifact = receiver.await.map_err(|_| FetchError::Cancelled)??;
                Ok(LiveResource::from_parts(
                    Arc::clone(&self.shared),
                    fingerprint,
                    downcast_resource::<R>(artifact),
                ))
            }

            JoinOutcome::Leading(guard) => {
                let fetched = match self.transport.fetch_resource::<R>(&identity).await {
                    Ok(fetched) => fetched,
                    Err(e) => {
                        let err = FetchError::from(e);
                        guard.fail(err.clone());
                        return Err(err);
                    }
                };

                let core = Arc::new(ResourceCore::new(
                    identity.clone(),
                    fetched,
                    &self.shared.queue,
                ));

                let bus_core = Arc::clone(&core);
                let bus_queue = Arc::clone(&self.shared.queue);
                let subscription = self.shared.bus.subscribe(R::TYPE_NAME, move |change| {
                    bus_core.apply_authoritative(change, &bus_queue);
                });

                let refresh_core = Arc::clone(&core);
                let refresh_queue = Arc::clone(&self.shared.queue);
                let refresh: Arc<dyn Fn() + Send + Sync> =
                    Arc::new(move || refresh_core.refresh(&refresh_queue));

                let erased: ErasedArtifact = Arc::clone(&core) as ErasedArtifact;
                match guard.succeed(erased, R::TYPE_NAME, subscription, refresh) {
                    Some(_) => Ok(LiveResource::from_parts(
                        Arc::clone(&self.shared),
                        fingerprint,
                        core,
                    )),
                    None => {
                        self.shared.bus.unsubscribe(subscription);
                        Err(FetchError::Cancelled)
                    }
                }
            }
        }
    }

    /// Fetch the next page of an incomplete collection and fold it in.
    /// Returns false when the collection was already complete.
    pub async fn load_more<R: Resource>(
        &self,
        collection: &LiveCollection<R>,
    ) -> Result<bool, FetchError> {
        let Some(next) = collection.core().next_cursor() else {
            return Ok(false);
        };

        let page = self
            .transport
            .fetch_page::<R>(&next)
            .await
            .map_err(FetchError::from)?;
        collection.core().absorb_page(page, &self.shared.queue);
        Ok(true)
    }

    /// Create a resource, optimistically adding it to matching live views.
    pub async fn create<R: Resource>(&self, resource: R) -> Result<Versioned<R>, StoreError> {
        let change = ResourceChange::addition(&resource)
            .map_err(|e| StoreError::Validation(e.to_string()))?;
        let operation = self.shared.queue.begin(change);
        self.refresh_views(R::TYPE_NAME);

        match self.store.create(&resource).await {
            Ok(stored) => {
                self.shared.queue.settle(operation);
                self.publish_confirmed(ResourceChange::addition(&stored.data), R::TYPE_NAME);
                Ok(stored)
            }
            Err(err) => {
                self.shared.queue.settle(operation);
                self.refresh_views(R::TYPE_NAME);
                Err(err)
            }
        }
    }

    /// Replace a resource wholesale, guarded by the caller's last-observed
    /// version.
    pub async fn replace<R: Resource>(
        &self,
        resource: R,
        expected_version: u64,
    ) -> Result<Versioned<R>, StoreError> {
        let attrs = attrs_of(&resource).map_err(|e| StoreError::Validation(e.to_string()))?;
        let change = ResourceChange::Update {
            resource_type: R::TYPE_NAME.to_string(),
            identity: resource.identity(),
            partial: attrs,
        };
        let operation = self.shared.queue.begin(change);
        self.refresh_views(R::TYPE_NAME);

        match self.store.replace(&resource, expected_version).await {
            Ok(stored) => {
                self.shared.queue.settle(operation);
                self.publish_confirmed(confirmed_update(&stored.data), R::TYPE_NAME);
                Ok(stored)
            }
            Err(err) => {
                self.shared.queue.settle(operation);
                self.refresh_views(R::TYPE_NAME);
                Err(err)
            }
        }
    }

    /// Apply a partial update, guarded by the caller's last-observed
    /// version.
    pub async fn update<R: Resource>(
        &self,
        identity: Identity,
        partial: AttrMap,
        expected_version: u64,
    ) -> Result<Versioned<R>, StoreError> {
        let change = ResourceChange::update::<R>(identity.clone(), partial.clone());
        let operation = self.shared.queue.begin(change);
        self.refresh_views(R::TYPE_NAME);

        match self
            .store
            .update::<R>(&identity, &partial, expected_version)
            .await
        {
            Ok(stored) => {
                self.shared.queue.settle(operation);
                self.publish_confirmed(confirmed_update(&stored.data), R::TYPE_NAME);
                Ok(stored)
            }
            Err(err) => {
                self.shared.queue.settle(operation);
                self.refresh_views(R::TYPE_NAME);
                Err(err)
            }
        }
    }

    /// Destroy a resource, guarded by the caller's last-observed version.
    pub async fn destroy<R: Resource>(
        &self,
        identity: Identity,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let change = ResourceChange::removal::<R>(identity.clone());
        let operation = self.shared.queue.begin(change.clone());
        self.refresh_views(R::TYPE_NAME);

        match self.store.destroy::<R>(&identity, expected_version).await {
            Ok(()) => {
                self.shared.queue.settle(operation);
                self.shared.bus.publish(&change);
                Ok(())
            }
            Err(err) => {
                self.shared.queue.settle(operation);
                self.refresh_views(R::TYPE_NAME);
                Err(err)
            }
        }
    }

    /// Feed an authoritative change from the transport layer (server push)
    /// into the bus. Live views fold it in delivery order.
    pub fn publish(&self, change: &ResourceChange) {
        self.shared.bus.publish(change);
    }

    /// The write-side collaborator.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The read-side collaborator.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Number of mutations still awaiting their outcome.
    pub fn pending_mutations(&self) -> usize {
        self.shared.queue.len()
    }

    /// Number of live artifacts (including in-flight fetches).
    pub fn live_artifacts(&self) -> usize {
        self.shared.table.len()
    }

    fn refresh_views(&self, resource_type: &str) {
        for refresh in self.shared.table.refreshers_for(resource_type) {
            refresh();
        }
    }

    /// Publish the authoritative change for a confirmed mutation. If the
    /// stored resource cannot be re-encoded the views still re-derive, so
    /// the settled overlay never lingers.
    fn publish_confirmed(&self, change: Result<ResourceChange, AttrError>, resource_type: &str) {
        match change {
            Ok(change) => self.shared.bus.publish(&change),
            Err(e) => {
                warn!(resource_type, error = %e, "confirmed change could not be encoded");
                self.refresh_views(resource_type);
            }
        }
    }
}

/// Authoritative update change carrying the stored resource's full
/// attribute set - real values supersede the optimistic ones.
fn confirmed_update<R: Resource>(stored: &R) -> Result<ResourceChange, AttrError> {
    Ok(ResourceChange::Update {
        resource_type: R::TYPE_NAME.to_string(),
        identity: stored.identity(),
        partial: attrs_of(stored)?,
    })
}

fn downcast_collection<R: Resource>(artifact: ErasedArtifact) -> Arc<CollectionCore<R>> {
    artifact
        .downcast::<CollectionCore<R>>()
        .ok()
        .expect("fingerprint resolved to a different artifact type")
}

fn downcast_resource<R: Resource>(artifact: ErasedArtifact) -> Arc<ResourceCore<R>> {
    artifact
        .downcast::<ResourceCore<R>>()
        .ok()
        .expect("fingerprint resolved to a different artifact type")
}
