//! Transport - the read-side collaborator contract.
//!
//! The session fetches initial state through a [`Transport`]: one resource
//! by identity, or one page of a cursor query. Framing, authentication and
//! reconnect policy all live behind this trait; the cache core only sees
//! typed results and typed failures.

mod store_transport;

use async_trait::async_trait;
use std::fmt;

use crate::cursor::{Cursor, Page};
use crate::resource::{Identity, Resource};

pub use store_transport::StoreTransport;

/// Error type for transport fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The resource does not exist on the server.
    NotFound,
    /// Network-level failure (connection, timeout, protocol).
    Failure(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::NotFound => write!(f, "resource not found"),
            TransportError::Failure(msg) => write!(f, "transport failure: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// Read-side fetch operations against the server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch one resource by identity.
    async fn fetch_resource<R: Resource>(&self, identity: &Identity) -> Result<R, TransportError>;

    /// Fetch one page of a cursor query.
    async fn fetch_page<R: Resource>(&self, cursor: &Cursor) -> Result<Page<R>, TransportError>;
}
