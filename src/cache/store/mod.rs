//! Metadata store adapter (C2): the KV store contract spec §4.2/§6 requires.
//!
//! `KvStore` is the trait the rest of the cache engine programs against; it
//! ships a `redis`-backed production binding ([`redis_store::RedisStore`])
//! and an in-memory binding ([`memory::MemoryStore`]) used by tests and by
//! the in-process collapse fast path.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;

use crate::cache::errors::StoreError;

pub mod memory;
pub mod redis_store;

/// A single operation inside an atomic, ordered [`KvStore::transact`] group.
#[derive(Debug, Clone)]
pub enum StoreOp {
    /// `HMSET key field=value ...`
    HSet {
        key: String,
        fields: Vec<(String, String)>,
    },
    /// `SADD key member`
    SAdd { key: String, member: String },
    /// `EXPIRE key ttl_secs`
    Expire { key: String, ttl_secs: i64 },
    /// `ZADD key score member`
    ZAdd {
        key: String,
        score: f64,
        member: String,
    },
    /// `DEL key`
    Del { key: String },
}

/// Contract for the external key-value store (spec §4.2, §6).
///
/// Implementations must provide the per-key linearizability the collapse
/// protocol (C5) and purge coordinator (C9) rely on for their ordering
/// guarantees (spec §5): a transaction's effects must be visible to any
/// reader that starts after the transaction completes.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// `HGETALL key`. Returns an empty map if the key does not exist.
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// `HGET key field`.
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// `EXISTS key`.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// `TTL key`, seconds remaining, or `None` if the key has no TTL or is absent.
    async fn ttl(&self, key: &str) -> Result<Option<i64>, StoreError>;

    /// `SMEMBERS key`.
    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Executes `ops` as a single atomic, ordered transaction (MULTI/EXEC or
    /// equivalent). Either every operation is applied, or none are.
    async fn transact(&self, ops: Vec<StoreOp>) -> Result<(), StoreError>;

    /// `SET key 1 NX EX ttl_secs`. Returns `true` iff the lock was acquired.
    async fn try_acquire_lock(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError>;

    /// Deletes every key given, best-effort (absent keys are not an error).
    async fn del_many(&self, keys: &[String]) -> Result<(), StoreError>;

    /// `PUBLISH channel message`.
    async fn publish(&self, channel: &str, message: &str) -> Result<(), StoreError>;

    /// Subscribes to `channel` and waits for a single message up to `timeout`.
    /// Returns `Ok(None)` on timeout without a message (not an error: callers
    /// fall back to a direct fetch per spec §4.4).
    async fn subscribe_wait(
        &self,
        channel: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError>;

    /// Keyspace scan: returns the next cursor (0 once exhausted) and the batch
    /// of matched keys.
    async fn scan(
        &self,
        pattern: &str,
        cursor: u64,
        count: u32,
    ) -> Result<(u64, Vec<String>), StoreError>;
}
