//! In-memory [`super::BlobStore`] binding for tests.

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::cache::errors::StorageError;

use super::BlobStore;

struct Entry {
    bytes: Bytes,
    expires_at: Instant,
}

/// In-memory blob store. Cheaply `Clone`d; all instances share state.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    entries: Arc<DashMap<String, Entry>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, id: &str, bytes: Bytes, ttl_secs: i64) -> Result<(), StorageError> {
        let expires_at = Instant::now() + std::time::Duration::from_secs(ttl_secs.max(0) as u64);
        self.entries.insert(id.to_string(), Entry { bytes, expires_at });
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Bytes>, StorageError> {
        let snapshot = self.entries.get(id).map(|e| (e.bytes.clone(), e.expires_at));
        match snapshot {
            Some((bytes, expires_at)) if expires_at > Instant::now() => Ok(Some(bytes)),
            Some(_) => {
                self.entries.remove(id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.entries.remove(id);
        Ok(())
    }

    async fn exists(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.get(id).await?.is_some())
    }

    async fn set_ttl(&self, id: &str, ttl_secs: i64) -> Result<(), StorageError> {
        let mut entry = self.entries.get_mut(id).ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        entry.expires_at = Instant::now() + std::time::Duration::from_secs(ttl_secs.max(0) as u64);
        Ok(())
    }
}
