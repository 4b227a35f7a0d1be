//! Cache writer (C7, spec §4.6): atomic multi-key write of metadata + body +
//! indexes with a computed TTL.
//!
//! The body is written to the storage driver *before* the metadata
//! transaction commits (spec §4.6); on transaction failure the entity is
//! orphaned and left for C10's GC sweep via the `entities` set (spec §9).

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

use crate::cache::{
    errors::{LedgeError, StorageError, StoreError},
    fetcher::header_fields,
    key_chain::KeyChain,
    storage::{self, BlobStore},
    store::{KvStore, StoreOp},
};

/// Errors surfaced by [`write`].
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<WriteError> for LedgeError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::Storage(e) => LedgeError::Storage(e),
            WriteError::Store(e) => LedgeError::Store(e),
        }
    }
}

/// Computes the physical TTL (seconds) for a cache write: the logical
/// freshness window from spec §4.5 (`expires - now + serve_when_stale`,
/// floored at 0) plus `keep_cache_for`'s post-expiry retention (spec §6).
///
/// `keep_cache_for` keeps the key chain physically queryable for a window
/// after logical expiry so that an "invalidate" purge's `expire_keys`
/// (which shrinks this TTL by the then-remaining freshness delta) leaves
/// roughly `keep_cache_for` seconds of headroom rather than deleting the
/// record outright (spec §8 Scenario 1: a second purge must see "already
/// expired", not "nothing to purge").
pub fn compute_ttl(expires: i64, now: i64, serve_when_stale: u64, keep_cache_for: u64) -> i64 {
    (expires - now + serve_when_stale as i64).max(0) + keep_cache_for as i64
}

/// Atomically commits a fetched, cacheable response under `chain`.
///
/// Returns the fresh entity id written to storage.
pub async fn write(
    store: &dyn KvStore,
    storage: &dyn BlobStore,
    chain: &KeyChain,
    uri: &str,
    status: StatusCode,
    headers: &HeaderMap,
    body: Bytes,
    expires: i64,
    ttl_secs: i64,
) -> Result<String, WriteError> {
    let entity_id = storage::new_entity_id();
    storage.put(&entity_id, body, ttl_secs).await?;

    let mut fields = vec![
        ("status".to_string(), status.as_u16().to_string()),
        ("uri".to_string(), uri.to_string()),
        ("expires".to_string(), expires.to_string()),
        ("entity".to_string(), entity_id.clone()),
    ];
    fields.extend(header_fields(headers));

    let mut ops = vec![
        StoreOp::HSet {
            key: chain.main.clone(),
            fields,
        },
        StoreOp::SAdd {
            key: chain.entities.clone(),
            member: entity_id.clone(),
        },
    ];
    for key in chain.ttl_bearing_keys() {
        ops.push(StoreOp::Expire {
            key: key.to_string(),
            ttl_secs,
        });
    }
    ops.push(StoreOp::ZAdd {
        key: "ledge:expires_queue".to_string(),
        score: expires as f64,
        member: uri.to_string(),
    });

    if let Err(err) = store.transact(ops).await {
        // Orphan entity: left in `entities` (never added since the transaction
        // that would SADD it failed too) for GC to reconcile against storage.
        return Err(err.into());
    }

    Ok(entity_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{storage::memory::MemoryBlobStore, store::memory::MemoryStore};

    #[test]
    fn ttl_is_floored_at_zero_before_keep_cache_for_is_added() {
        assert_eq!(compute_ttl(900, 1000, 0, 0), 0);
        assert_eq!(compute_ttl(1100, 1000, 0, 0), 100);
        assert_eq!(compute_ttl(900, 1000, 200, 0), 100);
    }

    #[test]
    fn keep_cache_for_extends_the_physical_ttl_past_logical_freshness() {
        assert_eq!(compute_ttl(1100, 1000, 0, 3600), 3700);
        assert_eq!(compute_ttl(900, 1000, 0, 3600), 3600);
    }

    #[tokio::test]
    async fn write_commits_metadata_and_entity_together() {
        let store = MemoryStore::new();
        let storage = MemoryBlobStore::new();
        let chain = KeyChain::derive("GET:/a");

        let mut headers = HeaderMap::new();
        headers.insert("content-type", "text/plain".parse().unwrap());

        let entity = write(
            &store,
            &storage,
            &chain,
            "http://example.com/a",
            StatusCode::OK,
            &headers,
            Bytes::from_static(b"hello"),
            2000,
            1000,
        )
        .await
        .unwrap();

        assert!(storage.exists(&entity).await.unwrap());
        let main = store.hgetall(&chain.main).await.unwrap();
        assert_eq!(main.get("entity"), Some(&entity));
        assert_eq!(main.get("status"), Some(&"200".to_string()));
        assert_eq!(main.get("h:content-type"), Some(&"text/plain".to_string()));
        let entities = store.smembers(&chain.entities).await.unwrap();
        assert_eq!(entities, vec![entity]);
    }
}
