//! `sled`-backed [`super::BlobStore`] binding.
//!
//! Grounded on the embedded on-disk KV store pattern used for caching
//! elsewhere in the retrieval pack. TTL is implemented by prefixing each
//! value with an 8-byte little-endian unix-seconds expiry, swept lazily on
//! `get`/`exists` and periodically by a background janitor task — the same
//! "TTL-based cleanup runs periodically" idiom already present in the
//! idempotency plugin's in-memory store.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;

use crate::cache::errors::StorageError;

use super::BlobStore;

const EXPIRY_HEADER_LEN: usize = 8;

fn encode(expires_at: i64, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(EXPIRY_HEADER_LEN + body.len());
    out.extend_from_slice(&expires_at.to_le_bytes());
    out.extend_from_slice(body);
    out
}

fn decode(raw: &[u8]) -> Option<(i64, &[u8])> {
    if raw.len() < EXPIRY_HEADER_LEN {
        return None;
    }
    let (header, body) = raw.split_at(EXPIRY_HEADER_LEN);
    let expires_at = i64::from_le_bytes(header.try_into().ok()?);
    Some((expires_at, body))
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Body store backed by an embedded `sled` database.
#[derive(Clone)]
pub struct SledStore {
    tree: sled::Db,
}

impl SledStore {
    /// Opens (or creates) the `sled` database at `path`.
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let tree = sled::open(path).map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(Self { tree })
    }

    /// Spawns a periodic background task that evicts expired entries.
    pub fn spawn_janitor(self: &Arc<Self>, interval: Duration) {
        let this = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            loop {
                tick.tick().await;
                let this = this.clone();
                let _ = tokio::task::spawn_blocking(move || this.sweep_expired()).await;
            }
        });
    }

    fn sweep_expired(&self) {
        let now = now();
        let mut expired = Vec::new();
        for item in self.tree.iter().flatten() {
            let (key, value) = item;
            if let Some((expires_at, _)) = decode(&value) {
                if expires_at <= now {
                    expired.push(key);
                }
            }
        }
        for key in expired {
            let _ = self.tree.remove(key);
        }
    }
}

#[async_trait]
impl BlobStore for SledStore {
    async fn put(&self, id: &str, bytes: Bytes, ttl_secs: i64) -> Result<(), StorageError> {
        let tree = self.tree.clone();
        let id = id.to_string();
        let expires_at = now() + ttl_secs.max(0);
        tokio::task::spawn_blocking(move || tree.insert(id.as_bytes(), encode(expires_at, &bytes)))
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Bytes>, StorageError> {
        let tree = self.tree.clone();
        let owned_id = id.to_string();
        let raw = tokio::task::spawn_blocking(move || tree.get(owned_id.as_bytes()))
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        let Some(raw) = raw else { return Ok(None) };
        match decode(&raw) {
            Some((expires_at, body)) if expires_at > now() => Ok(Some(Bytes::copy_from_slice(body))),
            _ => {
                let _ = self.delete(id).await;
                Ok(None)
            }
        }
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let tree = self.tree.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || tree.remove(id.as_bytes()))
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn exists(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.get(id).await?.is_some())
    }

    async fn set_ttl(&self, id: &str, ttl_secs: i64) -> Result<(), StorageError> {
        match self.get(id).await? {
            Some(body) => self.put(id, body, ttl_secs).await,
            None => Err(StorageError::NotFound(id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_store() -> (tempfile::TempDir, SledStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SledStore::open(dir.path().to_str().expect("utf8 path")).expect("open sled db");
        (dir, store)
    }

    #[tokio::test]
    async fn put_then_get_round_trips_the_body() {
        let (_dir, store) = open_store();
        store.put("a", Bytes::from_static(b"hello"), 60).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(Bytes::from_static(b"hello")));
        assert!(store.exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn expired_entry_reads_back_as_absent_and_is_removed() {
        let (_dir, store) = open_store();
        store.put("a", Bytes::from_static(b"hello"), -1).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        assert!(!store.exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn set_ttl_rewrites_the_expiry_without_losing_the_body() {
        let (_dir, store) = open_store();
        store.put("a", Bytes::from_static(b"hello"), 60).await.unwrap();
        store.set_ttl("a", -1).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_ttl_on_missing_id_is_not_found() {
        let (_dir, store) = open_store();
        let err = store.set_ttl("missing", 60).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_the_entry() {
        let (_dir, store) = open_store();
        store.put("a", Bytes::from_static(b"hello"), 60).await.unwrap();
        store.delete("a").await.unwrap();
        assert!(!store.exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn janitor_sweep_evicts_expired_entries_in_place() {
        let (_dir, store) = open_store();
        store.put("live", Bytes::from_static(b"keep"), 60).await.unwrap();
        store.put("dead", Bytes::from_static(b"gone"), -1).await.unwrap();
        store.sweep_expired();
        assert_eq!(store.get("live").await.unwrap(), Some(Bytes::from_static(b"keep")));
        assert!(store.tree.get("dead").unwrap().is_none());
    }
}
