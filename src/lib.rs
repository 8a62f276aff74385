mod bus;
mod cache;
mod cursor;
mod optimistic;
mod resource;
mod session;
mod store;
mod transport;

pub mod merge;

#[cfg(feature = "emitter")]
mod emitter;

pub use bus::{ChangeBus, SubscriberId};
pub use cache::{FetchError, Fingerprint, LiveCollection, LiveResource, ObserverId};
pub use cursor::{scalar_cmp, Cursor, CursorError, Direction, Page, DEFAULT_PAGE_SIZE};
pub use merge::MergeError;
pub use optimistic::{OperationId, OptimisticQueue, OptimisticRecord};
pub use resource::{
    attrs_of, resource_from_attrs, AttrError, AttrMap, Identity, Resource, ResourceChange,
};
pub use session::SyncSession;
pub use store::{InMemoryStore, StoreError, Versioned, VersionedStore};
pub use transport::{StoreTransport, Transport, TransportError};

#[cfg(feature = "emitter")]
pub use emitter::LiveEmitter;

// Re-export the derive macro so `#[derive(Resource)]` works alongside the trait
pub use synced_rust_macros::Resource;

// Re-export the EventEmitter from the event_emitter_rs crate
#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
