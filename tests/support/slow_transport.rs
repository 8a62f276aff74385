use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use synced_rust::{Cursor, Identity, Page, Resource, Transport, TransportError};

/// Transport wrapper that counts fetches and holds each one in flight for
/// a fixed delay. Pair with `#[tokio::test(start_paused = true)]` to let
/// concurrent subscribers pile onto one in-flight fetch deterministically.
pub struct SlowTransport<T> {
    inner: T,
    delay: Duration,
    page_fetches: Arc<AtomicUsize>,
    resource_fetches: Arc<AtomicUsize>,
}

impl<T> SlowTransport<T> {
    pub fn new(inner: T, delay: Duration) -> Self {
        SlowTransport {
            inner,
            delay,
            page_fetches: Arc::new(AtomicUsize::new(0)),
            resource_fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn page_fetches(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.page_fetches)
    }

    pub fn resource_fetches(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.resource_fetches)
    }
}

#[async_trait]
impl<T: Transport> Transport for SlowTransport<T> {
    async fn fetch_resource<R: Resource>(&self, identity: &Identity) -> Result<R, TransportError> {
        self.resource_fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.inner.fetch_resource(identity).await
    }

    async fn fetch_page<R: Resource>(&self, cursor: &Cursor) -> Result<Page<R>, TransportError> {
        self.page_fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.inner.fetch_page(cursor).await
    }
}
