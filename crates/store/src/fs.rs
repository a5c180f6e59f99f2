//! Local-directory [`BlobStore`] driver, backing the `file://` scheme.

use crate::{BlobStore, BlobStoreError, BytesMeter, MeteredStore};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Objects as files directly under one directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// A store rooted at `root`. The directory is expected to exist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_of(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

fn io_error(key: &str, err: io::Error) -> BlobStoreError {
    if err.kind() == io::ErrorKind::NotFound {
        BlobStoreError::NotFound { key: key.to_string() }
    } else {
        BlobStoreError::Io { key: key.to_string(), message: err.to_string() }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn read(&self, key: &str) -> Result<Bytes, BlobStoreError> {
        let bytes =
            tokio::fs::read(self.path_of(key)).await.map_err(|err| io_error(key, err))?;
        Ok(Bytes::from(bytes))
    }

    async fn exists(&self, key: &str) -> Result<bool, BlobStoreError> {
        match tokio::fs::metadata(self.path_of(key)).await {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(io_error(key, err)),
        }
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, BlobStoreError> {
        let mut entries =
            tokio::fs::read_dir(&self.root).await.map_err(|err| io_error(prefix, err))?;
        let mut keys = Vec::new();
        while let Some(entry) =
            entries.next_entry().await.map_err(|err| io_error(prefix, err))?
        {
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with(prefix) {
                    keys.push(name.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn scoped(&self, meter: BytesMeter) -> Option<Arc<dyn BlobStore>> {
        Some(Arc::new(MeteredStore::new(Arc::new(self.clone()), meter)))
    }
}

impl AsRef<Path> for FsBlobStore {
    fn as_ref(&self) -> &Path {
        &self.root
    }
}
