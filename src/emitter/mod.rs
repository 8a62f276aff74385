//! LiveEmitter - string-keyed callback bridge over live artifacts.
//!
//! Some consumers prefer event-emitter style callbacks to typed observers.
//! [`LiveEmitter`] forwards a live artifact's visible snapshots to an
//! `EventEmitter` as JSON strings, keyed by an event name of the caller's
//! choosing.
//!
//! # Example
//!
//! ```ignore
//! use synced_rust::LiveEmitter;
//!
//! let emitter = LiveEmitter::new();
//! emitter.on("tasks:changed", |payload: String| {
//!     println!("tasks now: {}", payload);
//! });
//!
//! emitter.attach_collection(&tasks, "tasks:changed");
//! ```

use std::sync::{Arc, Mutex};

use event_emitter_rs::EventEmitter;
use serde::Deserialize;
use tracing::warn;

use crate::cache::{LiveCollection, LiveResource, ObserverId};
use crate::resource::Resource;

/// Event-emitter bridge for live artifact snapshots.
pub struct LiveEmitter {
    emitter: Arc<Mutex<EventEmitter>>,
}

impl Default for LiveEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveEmitter {
    /// Create an emitter with no listeners.
    pub fn new() -> Self {
        LiveEmitter {
            emitter: Arc::new(Mutex::new(EventEmitter::new())),
        }
    }

    /// Register a listener for an event. Snapshot payloads arrive as JSON
    /// strings. Returns the listener id.
    pub fn on<F, T>(&self, event: &str, callback: F) -> String
    where
        for<'de> T: Deserialize<'de>,
        F: Fn(T) + 'static + Sync + Send,
    {
        self.emitter.lock().unwrap().on(event, callback)
    }

    /// Remove a listener by id.
    pub fn remove_listener(&self, id: &str) -> Option<String> {
        self.emitter.lock().unwrap().remove_listener(id)
    }

    /// Emit the collection's visible items as a JSON array under `event`
    /// whenever the collection changes. Returns the artifact observer id.
    pub fn attach_collection<R: Resource>(
        &self,
        collection: &LiveCollection<R>,
        event: &str,
    ) -> ObserverId {
        let emitter = Arc::clone(&self.emitter);
        let event = event.to_string();
        collection.observe(move |items| match serde_json::to_string(items) {
            Ok(payload) => {
                emitter.lock().unwrap().emit(&event, payload);
            }
            Err(e) => warn!(event, error = %e, "snapshot payload could not be encoded"),
        })
    }

    /// Emit the resource's visible value as JSON (or "null" once removed)
    /// under `event` whenever it changes. Returns the artifact observer id.
    pub fn attach_resource<R: Resource>(
        &self,
        resource: &LiveResource<R>,
        event: &str,
    ) -> ObserverId {
        let emitter = Arc::clone(&self.emitter);
        let event = event.to_string();
        resource.observe(move |current| match serde_json::to_string(&current) {
            Ok(payload) => {
                emitter.lock().unwrap().emit(&event, payload);
            }
            Err(e) => warn!(event, error = %e, "snapshot payload could not be encoded"),
        })
    }
}
