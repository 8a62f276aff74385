//! Fingerprint cache and live artifacts.
//!
//! The cache maps a canonical request [`Fingerprint`] to one shared, live
//! artifact: a [`LiveCollection`] for a cursor query or a [`LiveResource`]
//! for a single-entity query. However many consumers ask for the same
//! fingerprint, there is at most one concurrent fetch and one logical bus
//! subscription behind it; artifacts are reference-counted and evicted the
//! moment the last handle is dropped. There is no background expiry.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 SyncSession (per instance)              │
//! │   collection() / resource() / create() / update() ...   │
//! └─────────────────────────────────────────────────────────┘
//!            │                                  │
//!            ▼                                  ▼
//! ┌─────────────────────┐          ┌──────────────────────────┐
//! │     CacheTable      │          │        ChangeBus         │
//! │ fingerprint → slot  │          │ type-filtered subscribers│
//! │ (in-flight | ready) │          │ total-order delivery     │
//! └─────────────────────┘          └──────────────────────────┘
//!            │                                  │
//!            └────────────┬─────────────────────┘
//!                         ▼
//!          ┌───────────────────────────────┐
//!          │  CollectionCore / ResourceCore│
//!          │  confirmed + visible state    │
//!          │  (visible = confirmed folded  │
//!          │   with pending optimistic)    │
//!          └───────────────────────────────┘
//! ```

mod fingerprint;
mod live;
mod table;

use std::fmt;
use std::sync::Arc;

use crate::bus::ChangeBus;
use crate::optimistic::OptimisticQueue;
use crate::transport::TransportError;

pub use fingerprint::Fingerprint;
pub use live::{LiveCollection, LiveResource, ObserverId};

pub(crate) use live::{CollectionCore, ResourceCore};
pub(crate) use table::{CacheTable, ErasedArtifact, JoinOutcome};

/// The shared mutable structures of one cache instance. Owned by the
/// session and mutated exclusively by the cache core; consumers only ever
/// go through the public contract.
pub(crate) struct CacheShared {
    pub bus: ChangeBus,
    pub table: CacheTable,
    pub queue: Arc<OptimisticQueue>,
}

impl CacheShared {
    pub fn new() -> Self {
        CacheShared {
            bus: ChangeBus::new(),
            table: CacheTable::new(),
            queue: Arc::new(OptimisticQueue::new()),
        }
    }
}

/// Error type for read-side subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The resource does not exist on the server.
    NotFound,
    /// The transport failed; last known-good state (if any) stays presented.
    Transport(String),
    /// The fetch was cancelled because its last subscriber went away.
    Cancelled,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::NotFound => write!(f, "resource not found"),
            FetchError::Transport(msg) => write!(f, "fetch transport failure: {}", msg),
            FetchError::Cancelled => write!(f, "fetch cancelled"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<TransportError> for FetchError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::NotFound => FetchError::NotFound,
            TransportError::Failure(msg) => FetchError::Transport(msg),
        }
    }
}
