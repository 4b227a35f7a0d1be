//! In-memory [`super::KvStore`] binding for tests and single-process runs.
//!
//! Per spec §9, an in-process fast path may supplement but must never replace
//! pub/sub as the cross-worker correctness anchor; this binding is for tests
//! of the state machine, collapse coordinator, and purge coordinator without
//! a running Redis, not a production substitute for [`super::redis_store::RedisStore`].

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::cache::errors::StoreError;

use super::{KvStore, StoreOp};

#[derive(Default)]
struct Hash {
    fields: HashMap<String, String>,
    expires_at: Option<Instant>,
}

#[derive(Default)]
struct SetEntry {
    members: HashSet<String>,
    expires_at: Option<Instant>,
}

/// In-memory KV store. Cheaply `Clone`d; all instances share state.
#[derive(Clone)]
pub struct MemoryStore {
    hashes: Arc<DashMap<String, Hash>>,
    sets: Arc<DashMap<String, SetEntry>>,
    locks: Arc<DashMap<String, Instant>>,
    channels: Arc<DashMap<String, broadcast::Sender<String>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            hashes: Arc::new(DashMap::new()),
            sets: Arc::new(DashMap::new()),
            locks: Arc::new(DashMap::new()),
            channels: Arc::new(DashMap::new()),
        }
    }

    fn channel(&self, name: &str) -> broadcast::Sender<String> {
        self
            .channels
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(16).0)
            .clone()
    }

    fn is_live(expires_at: Option<Instant>) -> bool {
        match expires_at {
            Some(t) => t > Instant::now(),
            None => true,
        }
    }
}

/// Minimal glob matcher supporting `*` (any sequence, including empty), the
/// only wildcard Redis `SCAN MATCH` patterns in this crate ever use.
fn glob_match(pattern: &str, candidate: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    if segments.len() == 1 {
        return pattern == candidate;
    }

    let mut rest = candidate;
    for (i, segment) in segments.iter().enumerate() {
        if i == 0 {
            if !rest.starts_with(segment) {
                return false;
            }
            rest = &rest[segment.len()..];
        } else if i == segments.len() - 1 {
            return rest.ends_with(segment);
        } else if let Some(pos) = rest.find(segment) {
            rest = &rest[pos + segment.len()..];
        } else {
            return false;
        }
    }
    true
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        match self.hashes.get(key) {
            Some(h) if Self::is_live(h.expires_at) => Ok(h.fields.clone()),
            _ => Ok(HashMap::new()),
        }
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        match self.hashes.get(key) {
            Some(h) if Self::is_live(h.expires_at) => Ok(h.fields.get(field).cloned()),
            _ => Ok(None),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let hash_live = self
            .hashes
            .get(key)
            .map(|h| Self::is_live(h.expires_at))
            .unwrap_or(false);
        let set_live = self
            .sets
            .get(key)
            .map(|s| Self::is_live(s.expires_at))
            .unwrap_or(false);
        Ok(hash_live || set_live)
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let expires_at = self
            .hashes
            .get(key)
            .and_then(|h| h.expires_at)
            .or_else(|| self.sets.get(key).and_then(|s| s.expires_at));
        Ok(expires_at.map(|t| (t - Instant::now()).as_secs() as i64))
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        match self.sets.get(key) {
            Some(s) if Self::is_live(s.expires_at) => Ok(s.members.iter().cloned().collect()),
            _ => Ok(Vec::new()),
        }
    }

    async fn transact(&self, ops: Vec<StoreOp>) -> Result<(), StoreError> {
        for op in ops {
            match op {
                StoreOp::HSet { key, fields } => {
                    let mut entry = self.hashes.entry(key).or_default();
                    for (field, value) in fields {
                        entry.fields.insert(field, value);
                    }
                }
                StoreOp::SAdd { key, member } => {
                    let mut entry = self.sets.entry(key).or_default();
                    entry.members.insert(member);
                }
                StoreOp::Expire { key, ttl_secs } => {
                    let deadline = Instant::now() + Duration::from_secs(ttl_secs.max(0) as u64);
                    if let Some(mut h) = self.hashes.get_mut(&key) {
                        h.expires_at = Some(deadline);
                    }
                    if let Some(mut s) = self.sets.get_mut(&key) {
                        s.expires_at = Some(deadline);
                    }
                }
                StoreOp::ZAdd { .. } => {
                    // Sorted-set expiry index is used by external priming/analysis
                    // tools only (spec §4.6); no in-memory consumer needs it.
                }
                StoreOp::Del { key } => {
                    self.hashes.remove(&key);
                    self.sets.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn try_acquire_lock(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut acquired = false;
        self
            .locks
            .entry(key.to_string())
            .and_modify(|expires_at| {
                if *expires_at <= now {
                    *expires_at = now + Duration::from_secs(ttl_secs);
                    acquired = true;
                }
            })
            .or_insert_with(|| {
                acquired = true;
                now + Duration::from_secs(ttl_secs)
            });
        Ok(acquired)
    }

    async fn del_many(&self, keys: &[String]) -> Result<(), StoreError> {
        for key in keys {
            self.hashes.remove(key);
            self.sets.remove(key);
            self.locks.remove(key);
        }
        Ok(())
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), StoreError> {
        let _ = self.channel(channel).send(message.to_string());
        Ok(())
    }

    async fn subscribe_wait(
        &self,
        channel: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError> {
        let mut rx = self.channel(channel).subscribe();
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Ok(msg)) => Ok(Some(msg)),
            _ => Ok(None),
        }
    }

    async fn scan(
        &self,
        pattern: &str,
        _cursor: u64,
        _count: u32,
    ) -> Result<(u64, Vec<String>), StoreError> {
        let mut matched: Vec<String> = self
            .hashes
            .iter()
            .map(|e| e.key().clone())
            .filter(|k| glob_match(pattern, k))
            .collect();
        matched.sort();
        matched.dedup();
        Ok((0, matched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_match_handles_embedded_wildcard() {
        assert!(glob_match("ledge:GET:http://x/p*:main", "ledge:GET:http://x/p?t=1:main"));
        assert!(!glob_match("ledge:GET:http://x/p*:main", "ledge:GET:http://x/q?t=1:main"));
        assert!(glob_match("no-wildcard", "no-wildcard"));
    }

    #[tokio::test]
    async fn lock_is_exclusive_until_ttl_elapses() {
        let store = MemoryStore::new();
        assert!(store.try_acquire_lock("l", 60).await.unwrap());
        assert!(!store.try_acquire_lock("l", 60).await.unwrap());
    }

    #[tokio::test]
    async fn transact_applies_all_ops() {
        let store = MemoryStore::new();
        store
            .transact(vec![
                StoreOp::HSet {
                    key: "main".into(),
                    fields: vec![("status".into(), "200".into())],
                },
                StoreOp::SAdd {
                    key: "entities".into(),
                    member: "e1".into(),
                },
            ])
            .await
            .unwrap();

        let main = store.hgetall("main").await.unwrap();
        assert_eq!(main.get("status"), Some(&"200".to_string()));
        let entities = store.smembers("entities").await.unwrap();
        assert_eq!(entities, vec!["e1".to_string()]);
    }

    #[tokio::test]
    async fn publish_wakes_a_waiting_subscriber() {
        let store = MemoryStore::new();
        let store2 = store.clone();
        let waiter = tokio::spawn(async move {
            store2
                .subscribe_wait("root", Duration::from_secs(1))
                .await
                .unwrap()
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.publish("root", "finished").await.unwrap();
        assert_eq!(waiter.await.unwrap(), Some("finished".to_string()));
    }
}
