//! CacheTable - fingerprint slots with single-flight fetch coordination.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tracing::debug;

use crate::bus::SubscriberId;

use super::{FetchError, Fingerprint};

/// Type-erased shared artifact core; typed handles downcast on retrieval.
pub(crate) type ErasedArtifact = Arc<dyn std::any::Any + Send + Sync>;

type FetchResult = Result<ErasedArtifact, FetchError>;

struct InFlightSlot {
    waiters: Vec<oneshot::Sender<FetchResult>>,
}

struct ReadySlot {
    refcount: usize,
    artifact: ErasedArtifact,
    subscription: SubscriberId,
    resource_type: String,
    /// Recomputes the artifact's visible state from confirmed state plus
    /// the pending optimistic records.
    refresh: Arc<dyn Fn() + Send + Sync>,
}

enum Slot {
    InFlight(InFlightSlot),
    Ready(ReadySlot),
}

/// The fingerprint table of one cache instance.
pub(crate) struct CacheTable {
    slots: Mutex<HashMap<Fingerprint, Slot>>,
}

/// Outcome of asking the table for a fingerprint.
pub(crate) enum JoinOutcome<'a> {
    /// The artifact exists; its subscriber count was incremented.
    Existing(ErasedArtifact),
    /// Another caller's fetch is in flight; await its result.
    Waiting(oneshot::Receiver<FetchResult>),
    /// This caller leads the fetch and must settle the guard.
    Leading(LeaderGuard<'a>),
}

/// Bookkeeping returned when a release drops the last reference.
pub(crate) struct Evicted {
    pub subscription: SubscriberId,
}

impl CacheTable {
    pub fn new() -> Self {
        CacheTable {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Join the slot for a fingerprint, becoming either a subscriber of the
    /// ready artifact, a waiter on the in-flight fetch, or the fetch leader.
    pub fn join(&self, fingerprint: &Fingerprint) -> JoinOutcome<'_> {
        let mut slots = self.slots.lock().unwrap();
        match slots.get_mut(fingerprint) {
            Some(Slot::Ready(ready)) => {
                ready.refcount += 1;
                JoinOutcome::Existing(Arc::clone(&ready.artifact))
            }
            Some(Slot::InFlight(in_flight)) => {
                let (sender, receiver) = oneshot::channel();
                in_flight.waiters.push(sender);
                JoinOutcome::Waiting(receiver)
            }
            None => {
                slots.insert(
                    fingerprint.clone(),
                    Slot::InFlight(InFlightSlot {
                        waiters: Vec::new(),
                    }),
                );
                JoinOutcome::Leading(LeaderGuard {
                    table: self,
                    fingerprint: fingerprint.clone(),
                    armed: true,
                })
            }
        }
    }

    /// Increment the subscriber count of a ready slot (handle clone).
    pub fn acquire(&self, fingerprint: &Fingerprint) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(Slot::Ready(ready)) = slots.get_mut(fingerprint) {
            ready.refcount += 1;
        }
    }

    /// Decrement the subscriber count; at zero the slot is evicted and the
    /// caller must cancel the returned bus subscription.
    pub fn release(&self, fingerprint: &Fingerprint) -> Option<Evicted> {
        let mut slots = self.slots.lock().unwrap();
        match slots.get_mut(fingerprint) {
            Some(Slot::Ready(ready)) => {
                ready.refcount -= 1;
                if ready.refcount > 0 {
                    return None;
                }
                let subscription = ready.subscription;
                slots.remove(fingerprint);
                debug!(fingerprint = %fingerprint, "evicted live artifact");
                Some(Evicted { subscription })
            }
            _ => None,
        }
    }

    /// Snapshot the refresh hooks of every ready artifact for one resource
    /// type. Called without holding the table lock during the refreshes.
    pub fn refreshers_for(&self, resource_type: &str) -> Vec<Arc<dyn Fn() + Send + Sync>> {
        let slots = self.slots.lock().unwrap();
        slots
            .values()
            .filter_map(|slot| match slot {
                Slot::Ready(ready) if ready.resource_type == resource_type => {
                    Some(Arc::clone(&ready.refresh))
                }
                _ => None,
            })
            .collect()
    }

    /// Number of live slots (in-flight and ready).
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }
}

/// Guard held by the caller that leads a fetch for a fingerprint.
///
/// Exactly one of `succeed` / `fail` settles the slot. If the guard is
/// dropped instead - the leading future was cancelled mid-fetch - the slot
/// is removed and every waiter fails with [`FetchError::Cancelled`], so no
/// fetch result is ever installed for a fingerprint nobody references.
pub(crate) struct LeaderGuard<'a> {
    table: &'a CacheTable,
    fingerprint: Fingerprint,
    armed: bool,
}

impl LeaderGuard<'_> {
    /// Install the fetched artifact and fan it out to every waiter still
    /// listening. Returns the initial subscriber count, or None if the slot
    /// was gone (the caller should dispose of the artifact).
    pub fn succeed(
        mut self,
        artifact: ErasedArtifact,
        resource_type: &str,
        subscription: SubscriberId,
        refresh: Arc<dyn Fn() + Send + Sync>,
    ) -> Option<usize> {
        self.armed = false;
        let mut slots = self.table.slots.lock().unwrap();
        let in_flight = match slots.remove(&self.fingerprint) {
            Some(Slot::InFlight(in_flight)) => in_flight,
            _ => return None,
        };

        // The leader counts as one subscriber; each waiter whose receiver
        // is still alive counts as another. A waiter cancelled mid-await
        // makes its send fail and is not counted.
        let mut refcount = 1;
        for waiter in in_flight.waiters {
            if waiter.send(Ok(Arc::clone(&artifact))).is_ok() {
                refcount += 1;
            }
        }

        slots.insert(
            self.fingerprint.clone(),
            Slot::Ready(ReadySlot {
                refcount,
                artifact,
                subscription,
                resource_type: resource_type.to_string(),
                refresh,
            }),
        );
        Some(refcount)
    }

    /// Fail the fetch: remove the slot and propagate the error to waiters.
    pub fn fail(mut self, err: FetchError) {
        self.armed = false;
        let mut slots = self.table.slots.lock().unwrap();
        if let Some(Slot::InFlight(in_flight)) = slots.remove(&self.fingerprint) {
            for waiter in in_flight.waiters {
                let _ = waiter.send(Err(err.clone()));
            }
        }
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slots = self.table.slots.lock().unwrap();
        if let Some(Slot::InFlight(in_flight)) = slots.remove(&self.fingerprint) {
            debug!(fingerprint = %self.fingerprint, "fetch leader cancelled");
            for waiter in in_flight.waiters {
                let _ = waiter.send(Err(FetchError::Cancelled));
            }
        }
    }
}
