//! The consumed byte-blob store contract.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use thiserror::Error;

/// Errors surfaced by a [`BlobStore`] driver.
#[derive(Debug, Error)]
pub enum BlobStoreError {
    /// The object does not exist.
    #[error("object {key:?} not found")]
    NotFound {
        /// The requested key.
        key: String,
    },
    /// Any other driver failure; treated as transient by callers that retry.
    #[error("storage i/o on {key:?}: {message}")]
    Io {
        /// The requested key.
        key: String,
        /// Driver-reported failure.
        message: String,
    },
}

impl BlobStoreError {
    /// Whether this error means the object is absent (as opposed to
    /// temporarily unreadable).
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Read-only access to a logical object store.
///
/// Drivers are supplied by the embedding process; the core only consumes
/// this interface. Listing is lexicographic over keys.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Reads a whole object.
    async fn read(&self, key: &str) -> Result<Bytes, BlobStoreError>;

    /// Whether an object exists, without reading it.
    async fn exists(&self, key: &str) -> Result<bool, BlobStoreError>;

    /// Lists keys starting with `prefix`, in lexicographic order.
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, BlobStoreError>;

    /// Returns a view of this store that accounts every byte read into
    /// `meter`, when the driver supports per-request scoping.
    ///
    /// `None` means the driver cannot scope and callers share the handle;
    /// both paths must behave identically apart from metering.
    fn scoped(&self, meter: BytesMeter) -> Option<Arc<dyn BlobStore>> {
        let _ = meter;
        None
    }
}

/// A cheap, cloneable byte counter attached to scoped store views.
#[derive(Debug, Clone, Default)]
pub struct BytesMeter(Arc<AtomicU64>);

impl BytesMeter {
    /// Creates a meter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts `n` more bytes.
    pub fn add_bytes(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    /// Total bytes accounted so far.
    pub fn total(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A [`BlobStore`] wrapper that meters bytes read through it.
///
/// Drivers that support scoping typically return one of these from
/// [`BlobStore::scoped`].
#[derive(Clone)]
pub struct MeteredStore {
    inner: Arc<dyn BlobStore>,
    meter: BytesMeter,
}

impl std::fmt::Debug for MeteredStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeteredStore").field("meter", &self.meter).finish_non_exhaustive()
    }
}

impl MeteredStore {
    /// Wraps `inner`, accounting reads into `meter`.
    pub fn new(inner: Arc<dyn BlobStore>, meter: BytesMeter) -> Self {
        Self { inner, meter }
    }
}

#[async_trait]
impl BlobStore for MeteredStore {
    async fn read(&self, key: &str) -> Result<Bytes, BlobStoreError> {
        let bytes = self.inner.read(key).await?;
        self.meter.add_bytes(bytes.len() as u64);
        Ok(bytes)
    }

    async fn exists(&self, key: &str) -> Result<bool, BlobStoreError> {
        self.inner.exists(key).await
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, BlobStoreError> {
        self.inner.list_prefix(prefix).await
    }

    // Already scoped; re-scoping keeps the innermost driver but swaps meters.
    fn scoped(&self, meter: BytesMeter) -> Option<Arc<dyn BlobStore>> {
        Some(Arc::new(Self::new(self.inner.clone(), meter)))
    }
}
