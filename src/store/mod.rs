//! Versioned store - the write-side collaborator contract.
//!
//! The cache core never owns persistent state; it consumes an abstract
//! store whose mutations are guarded by a version attribute. Every call
//! that targets an existing resource carries the version the caller last
//! observed, and the store accepts the mutation only if the stored version
//! still matches - otherwise it fails with [`StoreError::VersionConflict`]
//! and the caller re-fetches and retries. The cache core's own job is to
//! surface that conflict to the optimistic mutation queue for rollback.
//!
//! ## Example
//!
//! ```ignore
//! use synced_rust::{InMemoryStore, VersionedStore};
//!
//! let store = InMemoryStore::new();
//! let stored = store.create(&task).await?;
//! let updated = store.replace(&edited, stored.version).await?;
//! ```

mod in_memory;

use async_trait::async_trait;
use std::fmt;

use crate::cursor::{Cursor, Page};
use crate::resource::{AttrMap, Identity, Resource};

pub use in_memory::InMemoryStore;

/// A resource paired with the store version that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub data: T,
    pub version: u64,
}

/// Error type for versioned store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No resource exists for the identity.
    NotFound {
        resource_type: String,
        identity: String,
    },
    /// A resource already exists for the identity.
    AlreadyExists {
        resource_type: String,
        identity: String,
    },
    /// Optimistic concurrency conflict.
    VersionConflict {
        resource_type: String,
        identity: String,
        expected: u64,
        actual: u64,
    },
    /// Rejected by the external serializer; passed through opaquely.
    Validation(String),
    /// Storage-level error.
    Storage(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound {
                resource_type,
                identity,
            } => write!(f, "resource not found: {}:{}", resource_type, identity),
            StoreError::AlreadyExists {
                resource_type,
                identity,
            } => write!(f, "resource already exists: {}:{}", resource_type, identity),
            StoreError::VersionConflict {
                resource_type,
                identity,
                expected,
                actual,
            } => write!(
                f,
                "version conflict on {}:{} (expected version {}, actual {})",
                resource_type, identity, expected, actual
            ),
            StoreError::Validation(msg) => write!(f, "validation failure: {}", msg),
            StoreError::Storage(msg) => write!(f, "storage error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Abstract versioned CRUD + list storage, keyed by identity.
#[async_trait]
pub trait VersionedStore: Send + Sync {
    /// Fetch one resource by identity.
    async fn retrieve<R: Resource>(&self, identity: &Identity) -> Result<Versioned<R>, StoreError>;

    /// Insert a new resource. Fails with `AlreadyExists` if the identity is
    /// taken.
    async fn create<R: Resource>(&self, resource: &R) -> Result<Versioned<R>, StoreError>;

    /// Replace an existing resource wholesale, guarded by the caller's
    /// last-observed version.
    async fn replace<R: Resource>(
        &self,
        resource: &R,
        expected_version: u64,
    ) -> Result<Versioned<R>, StoreError>;

    /// Apply a partial attribute change to an existing resource, guarded by
    /// the caller's last-observed version.
    async fn update<R: Resource>(
        &self,
        identity: &Identity,
        partial: &AttrMap,
        expected_version: u64,
    ) -> Result<Versioned<R>, StoreError>;

    /// Delete an existing resource, guarded by the caller's last-observed
    /// version.
    async fn destroy<R: Resource>(
        &self,
        identity: &Identity,
        expected_version: u64,
    ) -> Result<(), StoreError>;

    /// Run a cursor query, returning one page and its continuation.
    async fn list<R: Resource>(&self, cursor: &Cursor) -> Result<Page<R>, StoreError>;
}
