//! In-memory [`BlobStore`] driver.
//!
//! Backs the `memory://` store scheme and every test that needs an object
//! store without external infrastructure. Reads can be scripted to fail a
//! number of times to exercise retry paths.

use crate::{BlobStore, BlobStoreError, BytesMeter, MeteredStore};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, Bytes>,
    failures: HashMap<String, u32>,
}

/// An in-memory object store.
///
/// Clones share the same backing map, mirroring how real drivers share one
/// remote bucket across handles.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryBlobStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an object.
    pub fn set_object(&self, key: &str, bytes: Bytes) {
        self.inner.lock().expect("store lock").objects.insert(key.to_string(), bytes);
    }

    /// Removes an object.
    pub fn remove_object(&self, key: &str) {
        self.inner.lock().expect("store lock").objects.remove(key);
    }

    /// Makes the next `times` reads of `key` fail with a transient error.
    pub fn fail_reads(&self, key: &str, times: u32) {
        self.inner.lock().expect("store lock").failures.insert(key.to_string(), times);
    }

    fn take_failure(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().expect("store lock");
        match inner.failures.get_mut(key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read(&self, key: &str) -> Result<Bytes, BlobStoreError> {
        if self.take_failure(key) {
            return Err(BlobStoreError::Io {
                key: key.to_string(),
                message: "scripted transient failure".to_string(),
            });
        }
        self.inner
            .lock()
            .expect("store lock")
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| BlobStoreError::NotFound { key: key.to_string() })
    }

    async fn exists(&self, key: &str) -> Result<bool, BlobStoreError> {
        Ok(self.inner.lock().expect("store lock").objects.contains_key(key))
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, BlobStoreError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner
            .objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn scoped(&self, meter: BytesMeter) -> Option<Arc<dyn BlobStore>> {
        Some(Arc::new(MeteredStore::new(Arc::new(self.clone()), meter)))
    }
}
