//! Purge coordinator (C9, spec §4.8): synchronous purge for exact keys;
//! schedules background wildcard purge; implements the three purge modes.

use serde::Serialize;

use crate::cache::{
    errors::StoreError,
    jobqueue::{self, Job, JobClass, JobQueue},
    key_chain::KeyChain,
    store::{KvStore, StoreOp},
    CacheEngine,
};

/// Purge mode selected by the `X-Purge` request header (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeMode {
    /// Reduce the entry's TTL to immediately-expired. Default.
    Invalidate,
    /// Remove every key in the chain and the body entity.
    Delete,
    /// Invalidate, then schedule a background re-fetch.
    Revalidate,
}

impl PurgeMode {
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("delete") => PurgeMode::Delete,
            Some("revalidate") => PurgeMode::Revalidate,
            _ => PurgeMode::Invalidate,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PurgeMode::Invalidate => "invalidate",
            PurgeMode::Delete => "delete",
            PurgeMode::Revalidate => "revalidate",
        }
    }
}

/// A queued job descriptor, serialized verbatim into the purge response body
/// (spec §6: `qless_job`).
#[derive(Debug, Serialize)]
pub struct QlessJobOptions {
    pub tags: Vec<String>,
    pub jid: String,
    pub priority: i32,
}

#[derive(Debug, Serialize)]
pub struct QlessJob {
    pub klass: &'static str,
    pub jid: String,
    pub options: QlessJobOptions,
}

impl QlessJob {
    fn from_job(job: &Job) -> Self {
        Self {
            klass: job.klass.klass_name(),
            jid: job.jid.clone(),
            options: QlessJobOptions {
                tags: job.tags.clone(),
                jid: job.jid.clone(),
                priority: job.priority,
            },
        }
    }
}

/// Outcome of an exact-key purge (spec §4.8).
#[derive(Debug, Serialize)]
pub struct PurgeResult {
    pub purge_mode: &'static str,
    pub result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qless_job: Option<QlessJob>,
}

impl PurgeResult {
    /// HTTP status for this outcome (spec §4.8, §6): 200 on action taken or
    /// scheduled, 404 on "nothing to purge" / "already expired".
    pub fn status(&self) -> http::StatusCode {
        match self.result {
            "nothing to purge" | "already expired" => http::StatusCode::NOT_FOUND,
            _ => http::StatusCode::OK,
        }
    }
}

/// Purges the exact key chain for `root` per spec §4.8's exact-key flow.
pub async fn purge_exact(engine: &CacheEngine, root: &str, mode: PurgeMode) -> Result<PurgeResult, StoreError> {
    let chain = KeyChain::derive(root);

    let entity_id = engine.store.hget(&chain.main, "entity").await?;
    let entity_live = match &entity_id {
        Some(id) => engine.storage.exists(id).await.unwrap_or(false),
        None => false,
    };

    if entity_id.is_none() || !entity_live {
        return Ok(PurgeResult {
            purge_mode: mode.as_str(),
            result: "nothing to purge",
            qless_job: None,
        });
    }

    super::stats::record_purge(mode.as_str());

    if mode == PurgeMode::Delete {
        delete_chain(engine, &chain, entity_id.as_deref()).await?;
        return Ok(PurgeResult {
            purge_mode: mode.as_str(),
            result: "deleted",
            qless_job: None,
        });
    }

    let mut qless_job = None;
    if mode == PurgeMode::Revalidate {
        let job = Job::new(
            JobClass::Revalidate,
            jobqueue::revalidate_job_id(root),
            serde_json::json!({ "root": root }),
        );
        engine.jobs.enqueue(job.clone()).await?;
        qless_job = Some(QlessJob::from_job(&job));
    }

    let purged = expire_keys(engine, &chain).await?;

    Ok(PurgeResult {
        purge_mode: mode.as_str(),
        result: if purged { "purged" } else { "already expired" },
        qless_job,
    })
}

/// Schedules a wildcard purge scan (spec §4.8's wildcard flow). Always
/// succeeds with `"scheduled"` unless the queue itself rejects the job.
pub async fn purge_wildcard(
    engine: &CacheEngine,
    root_pattern: &str,
    mode: PurgeMode,
) -> Result<PurgeResult, StoreError> {
    let job = Job::new(
        JobClass::PurgeScan,
        jobqueue::purge_job_id(root_pattern),
        serde_json::json!({
            "pattern": root_pattern,
            "keyspace_scan_count": engine.config.keyspace_scan_count,
            "purge_mode": mode.as_str(),
        }),
    );
    engine.jobs.enqueue(job.clone()).await?;
    super::stats::record_purge(mode.as_str());

    Ok(PurgeResult {
        purge_mode: mode.as_str(),
        result: "scheduled",
        qless_job: Some(QlessJob::from_job(&job)),
    })
}

/// Deletes every key in the chain and the currently-referenced entity.
async fn delete_chain(
    engine: &CacheEngine,
    chain: &KeyChain,
    entity_id: Option<&str>,
) -> Result<(), StoreError> {
    let mut keys: Vec<String> = chain.ttl_bearing_keys().iter().map(|k| k.to_string()).collect();
    keys.push(chain.fetching_lock.clone());
    engine.store.del_many(&keys).await?;
    if let Some(id) = entity_id {
        let _ = engine.storage.delete(id).await;
    }
    Ok(())
}

/// Atomically reduces every key's TTL in the chain by `expires - now`, the
/// delta that makes `main.expires` immediately in the past (spec §4.8).
///
/// Returns `false` (no-op) if `main` is absent or already expired.
pub async fn expire_keys(engine: &CacheEngine, chain: &KeyChain) -> Result<bool, StoreError> {
    let now = super::now();
    let main = engine.store.hgetall(&chain.main).await?;
    let Some(expires) = main.get("expires").and_then(|v| v.parse::<i64>().ok()) else {
        return Ok(false);
    };
    if expires <= now {
        return Ok(false);
    }

    let delta = expires - now;
    let current_ttl = engine.store.ttl(&chain.main).await?.unwrap_or(0);
    let new_ttl = (current_ttl - delta).max(0);

    let mut ops = vec![StoreOp::HSet {
        key: chain.main.clone(),
        fields: vec![("expires".to_string(), (now - 1).to_string())],
    }];
    for key in chain.ttl_bearing_keys() {
        ops.push(StoreOp::Expire {
            key: key.to_string(),
            ttl_secs: new_ttl,
        });
    }
    engine.store.transact(ops).await?;

    if let Some(entity) = engine.store.hget(&chain.main, "entity").await? {
        let _ = engine.storage.set_ttl(&entity, new_ttl).await;
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{
        config::CacheConfig, jobqueue::memory::MemoryJobQueue, storage::memory::MemoryBlobStore,
        store::memory::MemoryStore, writer,
    };
    use bytes::Bytes;
    use http::{HeaderMap, StatusCode};
    use std::sync::Arc;

    fn engine() -> CacheEngine {
        CacheEngine::new(
            CacheConfig {
                serve_when_stale: 0,
                collapse_origin_requests: true,
                keep_cache_for: 3600,
                keyspace_scan_count: 100,
                upstream_host: "127.0.0.1".to_string(),
                upstream_port: 0,
                lock_ttl: 10,
                follower_wait: 1,
                listen_addr: "127.0.0.1:0".to_string(),
                redis_url: "redis://127.0.0.1:6379".to_string(),
                blob_path: "/tmp/ledge-test".to_string(),
            },
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryBlobStore::new()),
            Arc::new(MemoryJobQueue::new()),
        )
    }

    #[tokio::test]
    async fn purge_unknown_returns_nothing_to_purge() {
        let engine = engine();
        let result = purge_exact(&engine, "GET:http://x/none", PurgeMode::Invalidate)
            .await
            .unwrap();
        assert_eq!(result.result, "nothing to purge");
        assert_eq!(result.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalidate_then_reinvalidate_is_already_expired() {
        let engine = engine();
        let chain = KeyChain::derive("GET:http://x/a");
        let now = super::super::now();
        let expires = now + 3600;
        let ttl = writer::compute_ttl(expires, now, engine.config.serve_when_stale, engine.config.keep_cache_for);
        writer::write(
            engine.store.as_ref(),
            engine.storage.as_ref(),
            &chain,
            "http://x/a",
            StatusCode::OK,
            &HeaderMap::new(),
            Bytes::from_static(b"TEST1"),
            expires,
            ttl,
        )
        .await
        .unwrap();

        let first = purge_exact(&engine, "GET:http://x/a", PurgeMode::Invalidate)
            .await
            .unwrap();
        assert_eq!(first.result, "purged");
        assert_eq!(first.status(), StatusCode::OK);

        let second = purge_exact(&engine, "GET:http://x/a", PurgeMode::Invalidate)
            .await
            .unwrap();
        assert_eq!(second.result, "already expired");
        assert_eq!(second.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_mode_removes_entity_and_keys() {
        let engine = engine();
        let chain = KeyChain::derive("GET:http://x/d");
        let entity = writer::write(
            engine.store.as_ref(),
            engine.storage.as_ref(),
            &chain,
            "http://x/d",
            StatusCode::OK,
            &HeaderMap::new(),
            Bytes::from_static(b"TEST1"),
            super::super::now() + 3600,
            3600,
        )
        .await
        .unwrap();

        let result = purge_exact(&engine, "GET:http://x/d", PurgeMode::Delete)
            .await
            .unwrap();
        assert_eq!(result.result, "deleted");
        assert!(!engine.storage.exists(&entity).await.unwrap());
        assert!(!engine.store.exists(&chain.main).await.unwrap());
    }

    #[tokio::test]
    async fn revalidate_mode_enqueues_deterministic_job() {
        let engine = engine();
        let chain = KeyChain::derive("GET:http://x/r");
        writer::write(
            engine.store.as_ref(),
            engine.storage.as_ref(),
            &chain,
            "http://x/r",
            StatusCode::OK,
            &HeaderMap::new(),
            Bytes::from_static(b"TEST1"),
            super::super::now() + 3600,
            3600,
        )
        .await
        .unwrap();

        let result = purge_exact(&engine, "GET:http://x/r", PurgeMode::Revalidate)
            .await
            .unwrap();
        assert_eq!(result.result, "purged");
        let job = result.qless_job.expect("revalidate job scheduled");
        assert_eq!(job.klass, "ledge.jobs.revalidate");
        assert_eq!(job.jid, jobqueue::revalidate_job_id("GET:http://x/r"));
    }

    #[tokio::test]
    async fn wildcard_purge_is_idempotent() {
        let engine = engine();
        let a = purge_wildcard(&engine, "GET:http://x/p*", PurgeMode::Invalidate)
            .await
            .unwrap();
        let b = purge_wildcard(&engine, "GET:http://x/p*", PurgeMode::Invalidate)
            .await
            .unwrap();
        assert_eq!(a.qless_job.unwrap().jid, b.qless_job.unwrap().jid);
    }
}
