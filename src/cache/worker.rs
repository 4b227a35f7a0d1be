//! Background worker (C10, spec §4.9): consumes queued purge-scan and
//! revalidate jobs with idempotent job ids.
//!
//! Grounded on the teacher's own background-task idiom (`sled_store`'s
//! `spawn_janitor`, a `tokio::spawn`ed loop) generalized into a job-queue
//! consumer loop. Jobs are safe to retry on transient errors: re-running
//! `purge_exact`/a revalidate fetch is idempotent by construction (spec §4.9).

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method};

use crate::cache::{
    errors::OriginError,
    fetcher::{self, CacheDecision, OriginFetcher},
    jobqueue::{Job, JobClass},
    key_chain::KeyChain,
    purge::{self, PurgeMode},
    writer, CacheEngine,
};

/// Runs the worker loop until `shutdown` resolves, dequeuing and dispatching
/// jobs one at a time. Intended to be spawned as its own task (possibly many,
/// spec §5: "the background worker pool is parallel").
pub async fn run(engine: Arc<CacheEngine>, dequeue_timeout: Duration) {
    loop {
        match engine.jobs.dequeue(dequeue_timeout).await {
            Ok(Some(job)) => {
                if let Err(err) = dispatch(&engine, &job).await {
                    tracing::warn!(jid = %job.jid, error = %err, "background job failed, will retry on next scan/schedule");
                }
            }
            Ok(None) => {}
            Err(err) => {
                tracing::error!(error = %err, "job queue unavailable, backing off");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Store(#[from] crate::cache::errors::StoreError),
    #[error("malformed job payload: {0}")]
    BadPayload(String),
}

async fn dispatch(engine: &CacheEngine, job: &Job) -> Result<(), WorkerError> {
    match job.klass {
        JobClass::PurgeScan => run_purge_scan(engine, job).await,
        JobClass::Revalidate => run_revalidate(engine, job).await,
    }
}

/// Iterates the keyspace with the job's pattern and batch size, invoking the
/// exact-key purge flow (C9) for each matched root (spec §4.9).
async fn run_purge_scan(engine: &CacheEngine, job: &Job) -> Result<(), WorkerError> {
    let pattern = job
        .payload
        .get("pattern")
        .and_then(|v| v.as_str())
        .ok_or_else(|| WorkerError::BadPayload("missing pattern".to_string()))?;
    let mode = PurgeMode::from_header(job.payload.get("purge_mode").and_then(|v| v.as_str()));
    let count = job
        .payload
        .get("keyspace_scan_count")
        .and_then(|v| v.as_u64())
        .unwrap_or(100) as u32;

    let scan_pattern = format!("ledge:{pattern}:main");
    let mut cursor = 0u64;
    loop {
        let (next_cursor, keys) = engine.store.scan(&scan_pattern, cursor, count).await?;
        for key in keys {
            if let Some(root) = root_from_main_key(&key) {
                let _ = purge::purge_exact(engine, &root, mode).await;
            }
        }
        cursor = next_cursor;
        if cursor == 0 {
            break;
        }
    }
    Ok(())
}

/// Strips the `ledge:` prefix and `:main` suffix a scanned key carries,
/// recovering the fingerprint `purge_exact` expects.
fn root_from_main_key(key: &str) -> Option<String> {
    key
        .strip_prefix("ledge:")
        .and_then(|s| s.strip_suffix(":main"))
        .map(str::to_string)
}

/// Re-issues the original request against the origin and overwrites the
/// entry via C7. On origin failure the existing (reduced-TTL) entry is left
/// in place (spec §4.9, §7).
async fn run_revalidate(engine: &CacheEngine, job: &Job) -> Result<(), WorkerError> {
    let root = job
        .payload
        .get("root")
        .and_then(|v| v.as_str())
        .ok_or_else(|| WorkerError::BadPayload("missing root".to_string()))?;

    let chain = KeyChain::derive(root);
    let main = engine.store.hgetall(&chain.main).await?;
    let Some(uri) = main.get("uri").cloned() else {
        return Ok(());
    };

    let forwarded_headers = forwarded_request_headers(&main);

    let origin = OriginFetcher::new(
        engine.config.upstream_host.clone(),
        engine.config.upstream_port,
    );
    let parsed_uri: http::Uri = match uri.parse() {
        Ok(u) => u,
        Err(_) => return Ok(()),
    };

    let response = match origin
        .fetch(Method::GET, &parsed_uri, forwarded_headers.clone(), Bytes::new())
        .await
    {
        Ok(response) => response,
        Err(OriginError::Connect(_)) | Err(OriginError::Request(_)) => return Ok(()),
    };
    super::stats::record_origin_fetch();

    let now = super::now();
    let decision = fetcher::decide_cacheability(&Method::GET, &forwarded_headers, &response.headers, now);
    if let CacheDecision::Cacheable { expires } = decision {
        let ttl = writer::compute_ttl(expires, now, engine.config.serve_when_stale, engine.config.keep_cache_for);
        let _ = writer::write(
            engine.store.as_ref(),
            engine.storage.as_ref(),
            &chain,
            &uri,
            response.status,
            &response.headers,
            response.body,
            expires,
            ttl,
        )
        .await;
    }

    Ok(())
}

/// Forwards the subset of the original request's headers an operator has
/// configured for revalidation (spec §4.9 names `Cookie` as an example).
fn forwarded_request_headers(main: &std::collections::HashMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(cookie) = main.get("h:Cookie") {
        if let Ok(value) = http::HeaderValue::from_str(cookie) {
            headers.insert(http::header::COOKIE, value);
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{
        config::CacheConfig, jobqueue::memory::MemoryJobQueue, storage::memory::MemoryBlobStore,
        store::memory::MemoryStore, writer,
    };
    use http::StatusCode;
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
    async fn purge_scan_invalidates_every_matched_root() {
        let engine = engine();
        let now = super::super::now();
        let expires = now + 3600;
        let ttl = writer::compute_ttl(expires, now, engine.config.serve_when_stale, engine.config.keep_cache_for);
        for path in ["/p?t=1", "/p?t=2"] {
            let root = format!("GET:http://x{path}");
            let chain = KeyChain::derive(&root);
            writer::write(
                engine.store.as_ref(),
                engine.storage.as_ref(),
                &chain,
                &format!("http://x{path}"),
                StatusCode::OK,
                &HeaderMap::new(),
                Bytes::from_static(b"TEST"),
                expires,
                ttl,
            )
            .await
            .unwrap();
        }

        let job = Job::new(
            JobClass::PurgeScan,
            crate::cache::jobqueue::purge_job_id("GET:http://x/p*"),
            serde_json::json!({ "pattern": "GET:http://x/p*", "keyspace_scan_count": 100, "purge_mode": "invalidate" }),
        );
        run_purge_scan(&engine, &job).await.unwrap();

        for path in ["/p?t=1", "/p?t=2"] {
            let root = format!("GET:http://x{path}");
            let chain = KeyChain::derive(&root);
            let main = engine.store.hgetall(&chain.main).await.unwrap();
            let expires: i64 = main.get("expires").unwrap().parse().unwrap();
            assert!(expires <= super::super::now());
        }
    }

    #[tokio::test]
    async fn revalidate_job_missing_root_is_a_noop() {
        let engine = engine();
        let job = Job::new(JobClass::Revalidate, "deadbeef".repeat(4), serde_json::json!({}));
        assert!(run_revalidate(&engine, &job).await.is_ok());
    }
}
