//! Live artifacts - cache-resident materializations of queries.
//!
//! Each artifact keeps two sequences: `confirmed`, the last known server
//! state, and `visible`, which is always `confirmed` folded with every
//! pending optimistic record for the resource type in issuance order. Bus
//! deliveries advance `confirmed`; optimistic begin/settle recompute
//! `visible` from scratch, which is what lets a failed operation roll back
//! without disturbing other in-flight edits.
//!
//! Observer callbacks run after the artifact lock is released. They must
//! not synchronously publish changes or block on session mutations; kick
//! off a task instead.

use std::borrow::Cow;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::cursor::{Cursor, Page};
use crate::merge;
use crate::optimistic::OptimisticQueue;
use crate::resource::{resource_from_attrs, Identity, Resource, ResourceChange};

use super::{CacheShared, Fingerprint};

/// Handle to one registered observer callback.
pub type ObserverId = u64;

type CollectionObserver<R> = Arc<dyn Fn(&[R]) + Send + Sync>;
type ResourceObserver<R> = Arc<dyn Fn(Option<&R>) + Send + Sync>;

/// Fold one change into a collection view, gated by the view's cursor.
///
/// An addition whose resource falls outside the cursor's filters or `since`
/// bound is treated as a removal of that identity: absent items stay
/// absent, and items that no longer match drop out. The merge engine
/// itself stays filter-blind.
fn fold_one<R: Resource>(view: &[R], change: &ResourceChange, cursor: &Cursor) -> Vec<R> {
    let effective = match change {
        ResourceChange::Addition {
            resource_type,
            identity,
            resource,
        } if !cursor.accepts(resource) => Cow::Owned(ResourceChange::Removal {
            resource_type: resource_type.clone(),
            identity: identity.clone(),
        }),
        _ => Cow::Borrowed(change),
    };

    match merge::apply(view, effective.as_ref(), &cursor.ordering, cursor.direction) {
        Ok(next) => next,
        Err(e) => {
            warn!(kind = change.kind(), error = %e, "skipping unappliable change");
            view.to_vec()
        }
    }
}

fn fold_changes<R: Resource>(base: &[R], changes: &[ResourceChange], cursor: &Cursor) -> Vec<R> {
    let mut view = base.to_vec();
    for change in changes {
        view = fold_one(&view, change, cursor);
    }
    view
}

struct CollectionState<R: Resource> {
    cursor: Cursor,
    confirmed: Vec<R>,
    visible: Vec<R>,
    complete: bool,
    next: Option<Cursor>,
    observers: Vec<(ObserverId, CollectionObserver<R>)>,
    next_observer: ObserverId,
}

impl<R: Resource> CollectionState<R> {
    fn notification(&self) -> (Vec<CollectionObserver<R>>, Vec<R>) {
        let observers = self
            .observers
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        (observers, self.visible.clone())
    }
}

/// Shared state behind every [`LiveCollection`] handle for one fingerprint.
pub(crate) struct CollectionCore<R: Resource> {
    state: Mutex<CollectionState<R>>,
}

impl<R: Resource> CollectionCore<R> {
    pub fn new(cursor: Cursor, page: Page<R>, queue: &OptimisticQueue) -> Self {
        let next = page.next;
        let confirmed = page.items;
        let visible = fold_changes(&confirmed, &queue.pending_for(R::TYPE_NAME), &cursor);
        CollectionCore {
            state: Mutex::new(CollectionState {
                complete: next.is_none(),
                next,
                confirmed,
                visible,
                cursor,
                observers: Vec::new(),
                next_observer: 1,
            }),
        }
    }

    /// Fold a confirmed change from the bus into the collection.
    pub fn apply_authoritative(&self, change: &ResourceChange, queue: &OptimisticQueue) {
        let (observers, snapshot) = {
            let mut state = self.state.lock().unwrap();
            let confirmed = fold_one(&state.confirmed, change, &state.cursor);
            state.confirmed = confirmed;
            let visible = fold_changes(
                &state.confirmed,
                &queue.pending_for(R::TYPE_NAME),
                &state.cursor,
            );
            state.visible = visible;
            state.notification()
        };

        for observer in observers {
            observer(&snapshot);
        }
    }

    /// Re-derive the visible state from confirmed state plus the records
    /// still pending. Called when optimistic records are added or rolled
    /// back.
    pub fn refresh(&self, queue: &OptimisticQueue) {
        let (observers, snapshot) = {
            let mut state = self.state.lock().unwrap();
            let visible = fold_changes(
                &state.confirmed,
                &queue.pending_for(R::TYPE_NAME),
                &state.cursor,
            );
            state.visible = visible;
            state.notification()
        };

        for observer in observers {
            observer(&snapshot);
        }
    }

    /// Fold a further page of the query into the confirmed state.
    pub fn absorb_page(&self, page: Page<R>, queue: &OptimisticQueue) {
        let (observers, snapshot) = {
            let mut state = self.state.lock().unwrap();
            for item in page.items {
                match ResourceChange::addition(&item) {
                    Ok(change) => {
                        let confirmed = fold_one(&state.confirmed, &change, &state.cursor);
                        state.confirmed = confirmed;
                    }
                    Err(e) => warn!(error = %e, "skipping unencodable page item"),
                }
            }
            state.next = page.next;
            state.complete = state.next.is_none();
            let visible = fold_changes(
                &state.confirmed,
                &queue.pending_for(R::TYPE_NAME),
                &state.cursor,
            );
            state.visible = visible;
            state.notification()
        };

        for observer in observers {
            observer(&snapshot);
        }
    }

    pub fn current(&self) -> Vec<R> {
        self.state.lock().unwrap().visible.clone()
    }

    pub fn is_complete(&self) -> bool {
        self.state.lock().unwrap().complete
    }

    pub fn cursor(&self) -> Cursor {
        self.state.lock().unwrap().cursor.clone()
    }

    pub fn next_cursor(&self) -> Option<Cursor> {
        self.state.lock().unwrap().next.clone()
    }

    pub fn observe(&self, observer: CollectionObserver<R>) -> ObserverId {
        let mut state = self.state.lock().unwrap();
        let id = state.next_observer;
        state.next_observer += 1;
        state.observers.push((id, observer));
        id
    }

    pub fn unobserve(&self, id: ObserverId) -> bool {
        let mut state = self.state.lock().unwrap();
        let before = state.observers.len();
        state.observers.retain(|(observer_id, _)| *observer_id != id);
        state.observers.len() != before
    }
}

fn apply_resource_change<R: Resource>(current: Option<R>, change: &ResourceChange) -> Option<R> {
    match change {
        ResourceChange::Addition { resource, .. } => match resource_from_attrs::<R>(resource) {
            Ok(resource) => Some(resource),
            Err(e) => {
                warn!(error = %e, "skipping undecodable addition");
                current
            }
        },
        ResourceChange::Update { partial, .. } => current.map(|resource| {
            match merge::patch(&resource, partial) {
                Ok(patched) => patched,
                Err(e) => {
                    warn!(error = %e, "skipping unappliable update");
                    resource
                }
            }
        }),
        ResourceChange::Removal { .. } => None,
    }
}

fn fold_resource<R: Resource>(
    confirmed: Option<R>,
    changes: &[ResourceChange],
    identity: &Identity,
) -> Option<R> {
    changes
        .iter()
        .filter(|change| change.identity() == identity)
        .fold(confirmed, |current, change| {
            apply_resource_change(current, change)
        })
}

struct ResourceState<R: Resource> {
    confirmed: Option<R>,
    visible: Option<R>,
    observers: Vec<(ObserverId, ResourceObserver<R>)>,
    next_observer: ObserverId,
}

impl<R: Resource> ResourceState<R> {
    fn notification(&self) -> (Vec<ResourceObserver<R>>, Option<R>) {
        let observers = self
            .observers
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        (observers, self.visible.clone())
    }
}

/// Shared state behind every [`LiveResource`] handle for one fingerprint.
pub(crate) struct ResourceCore<R: Resource> {
    identity: Identity,
    state: Mutex<ResourceState<R>>,
}

impl<R: Resource> ResourceCore<R> {
    pub fn new(identity: Identity, resource: R, queue: &OptimisticQueue) -> Self {
        let confirmed = Some(resource);
        let visible = fold_resource(
            confirmed.clone(),
            &queue.pending_for(R::TYPE_NAME),
            &identity,
        );
        ResourceCore {
            identity,
            state: Mutex::new(ResourceState {
                confirmed,
                visible,
                observers: Vec::new(),
                next_observer: 1,
            }),
        }
    }

    pub fn apply_authoritative(&self, change: &ResourceChange, queue: &OptimisticQueue) {
        if change.identity() != &self.identity {
            return;
        }

        let (observers, snapshot) = {
            let mut state = self.state.lock().unwrap();
            let confirmed = apply_resource_change(state.confirmed.clone(), change);
            state.confirmed = confirmed;
            let visible = fold_resource(
                state.confirmed.clone(),
                &queue.pending_for(R::TYPE_NAME),
                &self.identity,
            );
            state.visible = visible;
            state.notification()
        };

        for observer in observers {
            observer(snapshot.as_ref());
        }
    }

    pub fn refresh(&self, queue: &OptimisticQueue) {
        let (observers, snapshot) = {
            let mut state = self.state.lock().unwrap();
            let visible = fold_resource(
                state.confirmed.clone(),
                &queue.pending_for(R::TYPE_NAME),
                &self.identity,
            );
            state.visible = visible;
            state.notification()
        };

        for observer in observers {
            observer(snapshot.as_ref());
        }
    }

    pub fn current(&self) -> Option<R> {
        self.state.lock().unwrap().visible.clone()
    }

    pub fn observe(&self, observer: ResourceObserver<R>) -> ObserverId {
        let mut state = self.state.lock().unwrap();
        let id = state.next_observer;
        state.next_observer += 1;
        state.observers.push((id, observer));
        id
    }

    pub fn unobserve(&self, id: ObserverId) -> bool {
        let mut state = self.state.lock().unwrap();
        let before = state.observers.len();
        state.observers.retain(|(observer_id, _)| *observer_id != id);
        state.observers.len() != before
    }
}

/// Subscriber handle to a live, reference-counted collection.
///
/// Cloning adds a subscriber; dropping the last handle unsubscribes the
/// collection from the change bus and evicts it from the cache.
pub struct LiveCollection<R: Resource> {
    shared: Arc<CacheShared>,
    fingerprint: Fingerprint,
    core: Arc<CollectionCore<R>>,
}

impl<R: Resource> LiveCollection<R> {
    pub(crate) fn from_parts(
        shared: Arc<CacheShared>,
        fingerprint: Fingerprint,
        core: Arc<CollectionCore<R>>,
    ) -> Self {
        LiveCollection {
            shared,
            fingerprint,
            core,
        }
    }

    pub(crate) fn core(&self) -> &Arc<CollectionCore<R>> {
        &self.core
    }

    /// Snapshot of the visible items, in the cursor's order.
    pub fn current(&self) -> Vec<R> {
        self.core.current()
    }

    /// True when the collection holds the query's entire result set.
    pub fn is_complete(&self) -> bool {
        self.core.is_complete()
    }

    /// The query this collection materializes.
    pub fn cursor(&self) -> Cursor {
        self.core.cursor()
    }

    /// The cache key this collection is shared under.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Register a callback invoked with the visible items after every
    /// change. Runs outside cache locks; it must not synchronously publish
    /// or mutate through the session.
    pub fn observe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&[R]) + Send + Sync + 'static,
    {
        self.core.observe(Arc::new(observer))
    }

    /// Remove a previously registered observer.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        self.core.unobserve(id)
    }

    /// Explicitly release this subscription. Equivalent to dropping the
    /// handle.
    pub fn unsubscribe(self) {}
}

impl<R: Resource> Clone for LiveCollection<R> {
    fn clone(&self) -> Self {
        self.shared.table.acquire(&self.fingerprint);
        LiveCollection {
            shared: Arc::clone(&self.shared),
            fingerprint: self.fingerprint.clone(),
            core: Arc::clone(&self.core),
        }
    }
}

impl<R: Resource> Drop for LiveCollection<R> {
    fn drop(&mut self) {
        if let Some(evicted) = self.shared.table.release(&self.fingerprint) {
            self.shared.bus.unsubscribe(evicted.subscription);
            debug!(fingerprint = %self.fingerprint, "released last collection handle");
        }
    }
}

/// Subscriber handle to a live, reference-counted single resource.
pub struct LiveResource<R: Resource> {
    shared: Arc<CacheShared>,
    fingerprint: Fingerprint,
    core: Arc<ResourceCore<R>>,
}

impl<R: Resource> std::fmt::Debug for LiveResource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveResource")
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

impl<R: Resource> LiveResource<R> {
    pub(crate) fn from_parts(
        shared: Arc<CacheShared>,
        fingerprint: Fingerprint,
        core: Arc<ResourceCore<R>>,
    ) -> Self {
        LiveResource {
            shared,
            fingerprint,
            core,
        }
    }

    /// Snapshot of the visible resource; None once removed.
    pub fn current(&self) -> Option<R> {
        self.core.current()
    }

    /// The cache key this resource is shared under.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Register a callback invoked with the visible resource after every
    /// change. Runs outside cache locks; it must not synchronously publish
    /// or mutate through the session.
    pub fn observe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(Option<&R>) + Send + Sync + 'static,
    {
        self.core.observe(Arc::new(observer))
    }

    /// Remove a previously registered observer.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        self.core.unobserve(id)
    }

    /// Explicitly release this subscription. Equivalent to dropping the
    /// handle.
    pub fn unsubscribe(self) {}
}

impl<R: Resource> Clone for LiveResource<R> {
    fn clone(&self) -> Self {
        self.shared.table.acquire(&self.fingerprint);
        LiveResource {
            shared: Arc::clone(&self.shared),
            fingerprint: self.fingerprint.clone(),
            core: Arc::clone(&self.core),
        }
    }
}

impl<R: Resource> Drop for LiveResource<R> {
    fn drop(&mut self) {
        if let Some(evicted) = self.shared.table.release(&self.fingerprint) {
            self.shared.bus.unsubscribe(evicted.subscription);
            debug!(fingerprint = %self.fingerprint, "released last resource handle");
        }
    }
}
