//! Change bus - multiplexed stream of resource changes.
//!
//! One [`ChangeBus`] lives inside each session (it is owned and injectable,
//! never a module-level singleton). Subscribers register a callback filtered
//! by resource type; [`ChangeBus::publish`] delivers synchronously, and
//! deliveries are serialized so that if change A is published before change
//! B, every subscriber observes A before B.
//!
//! Consumers never hold the registry lock while their callback runs: the
//! matching callbacks are snapshotted first, then invoked.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::resource::ResourceChange;

/// Handle to one bus subscription.
pub type SubscriberId = u64;

type DeliverFn = Arc<dyn Fn(&ResourceChange) + Send + Sync>;

struct BusSubscriber {
    id: SubscriberId,
    resource_type: String,
    deliver: DeliverFn,
}

/// Publish/subscribe registry for [`ResourceChange`] events.
pub struct ChangeBus {
    subscribers: Mutex<Vec<BusSubscriber>>,
    /// Held for the duration of each publish; this is what makes delivery
    /// order identical for every subscriber.
    delivery: Mutex<()>,
    next_id: AtomicU64,
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        ChangeBus {
            subscribers: Mutex::new(Vec::new()),
            delivery: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a callback for every change to the given resource type.
    pub fn subscribe<F>(&self, resource_type: &str, deliver: F) -> SubscriberId
    where
        F: Fn(&ResourceChange) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().unwrap().push(BusSubscriber {
            id,
            resource_type: resource_type.to_string(),
            deliver: Arc::new(deliver),
        });
        id
    }

    /// Remove a subscription. Returns false if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.lock().unwrap();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    /// Deliver a change to every subscriber of its resource type.
    pub fn publish(&self, change: &ResourceChange) {
        let _order = self.delivery.lock().unwrap();

        let matching: Vec<DeliverFn> = {
            let subscribers = self.subscribers.lock().unwrap();
            subscribers
                .iter()
                .filter(|s| s.resource_type == change.resource_type())
                .map(|s| Arc::clone(&s.deliver))
                .collect()
        };

        trace!(
            resource_type = change.resource_type(),
            kind = change.kind(),
            subscribers = matching.len(),
            "publishing change"
        );

        for deliver in matching {
            deliver(change);
        }
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}
