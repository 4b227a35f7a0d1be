//! Storage adapter (C3): opaque body blob storage keyed by entity id.
//!
//! Treated by the rest of the engine purely as `put/get/delete/exists/
//! set_ttl` (spec §1) — the body is never kept inline in the metadata field
//! map (spec §9 Open Questions).

use async_trait::async_trait;
use bytes::Bytes;

use crate::cache::errors::StorageError;

pub mod memory;
pub mod sled_store;

/// Contract for the body storage driver (spec §1, §4.6).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes `bytes` under `id` with the given TTL (seconds).
    async fn put(&self, id: &str, bytes: Bytes, ttl_secs: i64) -> Result<(), StorageError>;

    /// Reads the blob stored under `id`, if present and not expired.
    async fn get(&self, id: &str) -> Result<Option<Bytes>, StorageError>;

    /// Deletes the blob stored under `id`. Not an error if absent.
    async fn delete(&self, id: &str) -> Result<(), StorageError>;

    /// Whether a live (non-expired) blob exists under `id`.
    async fn exists(&self, id: &str) -> Result<bool, StorageError>;

    /// Updates the TTL (seconds) of an existing blob.
    async fn set_ttl(&self, id: &str, ttl_secs: i64) -> Result<(), StorageError>;
}

/// Generates a fresh, unguessable entity id for a newly written body.
///
/// Entities are append-only and immutable (spec §3): every write produces a
/// new id rather than mutating bytes in place.
pub fn new_entity_id() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
