//! Request lifecycle (C8, spec §4.7): the top-level state machine that
//! classifies a request against cache state and branches into the right
//! combination of serve / collapse / fetch.
//!
//! ```text
//!                  ┌──────────── not GET/HEAD? ──► FETCH ──► SEND
//!                  │
//! START ──► READ ──┼── HOT  ──► SEND
//!                  ├── WARM ──► enqueue revalidate job; SEND (action=none)
//!                  └── COLD/SUBZERO ──► COLLAPSE?
//!                                         │ no  ──► FETCH ──► SEND
//!                                         └ yes ──► C5 leader/follower ──► SEND
//! ```
//!
//! Events are emitted through [`crate::signals::app_signals`] (spec §9's
//! "polymorphic sink", not a mutable global hook list) at the stable points
//! spec §4.7 names: `config_loaded`, `cache_accessed`, `origin_fetched`,
//! `response_ready`, `response_sent`, `finished`.

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};

use crate::{
    cache::{
        collapse::{self, FollowerOutcome, Role},
        errors::LedgeError,
        fetcher::{self, CacheDecision, OriginFetcher},
        freshness::{self, Freshness},
        jobqueue::{self, Job, JobClass},
        key_chain::{self, KeyChain},
        writer, CacheEngine,
    },
    signals::{self, Signal},
};

/// Which branch of the state machine produced the response (spec §6's
/// `X-Cache-Action` header).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// This request performed the origin fetch itself.
    Fetched,
    /// This request waited on another request's fetch and served its result.
    Collapsed,
    /// Served directly from cache, no fetch involved (HOT, or WARM's
    /// fire-and-forget revalidation).
    None,
}

impl CacheAction {
    fn header_value(self) -> &'static str {
        match self {
            CacheAction::Fetched => "FETCHED",
            CacheAction::Collapsed => "COLLAPSED",
            CacheAction::None => "",
        }
    }
}

/// The fully-assembled response plus the bookkeeping needed to add the
/// cache-observability headers (spec §4.7).
pub struct LifecycleResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub state: Freshness,
    pub action: CacheAction,
}

/// Runs the full request lifecycle for a GET/HEAD request.
pub async fn handle(
    engine: &CacheEngine,
    method: Method,
    uri: &Uri,
    request_headers: HeaderMap,
    request_body: Bytes,
) -> Result<LifecycleResponse, LedgeError> {
    signals::app_signals()
        .emit(Signal::new("config_loaded"))
        .await;

    let root = key_chain::fingerprint(&method, uri);
    let chain = KeyChain::derive(&root);
    let now = super::now();

    let record = read_record(engine, &chain, now).await?;
    signals::app_signals().emit(Signal::new("cache_accessed")).await;

    let outcome = if fetcher::request_bypasses_cache(&request_headers) {
        fetch_and_maybe_cache(
            engine,
            &chain,
            method,
            uri,
            request_headers,
            request_body,
            now,
            CacheAction::Fetched,
        )
        .await
    } else {
        match record.state {
        Freshness::Hot => Ok(serve_from_record(record, Freshness::Hot, CacheAction::None)),
        Freshness::Warm => {
            let job = Job::new(
                JobClass::Revalidate,
                jobqueue::revalidate_job_id(&root),
                serde_json::json!({ "root": root }),
            );
            let _ = engine.jobs.enqueue(job).await;
            Ok(serve_from_record(record, Freshness::Warm, CacheAction::None))
        }
        Freshness::Cold | Freshness::Subzero => {
            if engine.config.collapse_origin_requests {
                collapse_then_serve(engine, &chain, method, uri, request_headers, request_body, now).await
            } else {
                fetch_and_maybe_cache(
                    engine,
                    &chain,
                    method,
                    uri,
                    request_headers,
                    request_body,
                    now,
                    CacheAction::Fetched,
                )
                .await
            }
        }
        }
    };

    if let Ok(response) = &outcome {
        super::stats::record_cache_state(response.state);
        super::stats::record_collapse(response.action);
    }

    signals::app_signals().emit(Signal::new("response_ready")).await;
    signals::app_signals().emit(Signal::new("response_sent")).await;
    signals::app_signals().emit(Signal::new("finished")).await;

    outcome
}

struct Record {
    state: Freshness,
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Bytes>,
}

async fn read_record(engine: &CacheEngine, chain: &KeyChain, now: i64) -> Result<Record, LedgeError> {
    let main = engine.store.hgetall(&chain.main).await?;
    let expires: Option<i64> = main.get("expires").and_then(|v| v.parse().ok());
    let entity_id = main.get("entity").cloned();

    let entity_present = match &entity_id {
        Some(id) => engine.storage.exists(id).await.unwrap_or(false),
        None => false,
    };

    let state = freshness::classify(expires, entity_present, now, engine.config.serve_when_stale);

    if !state.is_hit() {
        return Ok(Record {
            state,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: None,
        });
    }

    let status = main
        .get("status")
        .and_then(|s| s.parse::<u16>().ok())
        .and_then(|s| StatusCode::from_u16(s).ok())
        .unwrap_or(StatusCode::OK);

    let mut headers = HeaderMap::new();
    for (field, value) in &main {
        if let Some(name) = field.strip_prefix("h:") {
            if let (Ok(name), Ok(value)) = (
                http::HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.append(name, value);
            }
        }
    }

    let body = match entity_id {
        Some(id) => engine.storage.get(&id).await.unwrap_or(None),
        None => None,
    };

    Ok(Record {
        state,
        status,
        headers,
        body,
    })
}

fn serve_from_record(record: Record, state: Freshness, action: CacheAction) -> LifecycleResponse {
    LifecycleResponse {
        status: record.status,
        headers: record.headers,
        body: record.body.unwrap_or_default(),
        state,
        action,
    }
}

async fn collapse_then_serve(
    engine: &CacheEngine,
    chain: &KeyChain,
    method: Method,
    uri: &Uri,
    request_headers: HeaderMap,
    request_body: Bytes,
    now: i64,
) -> Result<LifecycleResponse, LedgeError> {
    let role = collapse::try_acquire(engine.store.as_ref(), chain, engine.config.lock_ttl).await?;

    match role {
        Role::Leader => {
            let result = fetch_and_maybe_cache(
                engine,
                chain,
                method,
                uri,
                request_headers,
                request_body,
                now,
                CacheAction::Fetched,
            )
            .await;
            collapse::finish_leader(engine.store.as_ref(), chain, result.is_ok())
                .await
                .ok();
            result
        }
        Role::Follower => {
            let outcome = collapse::await_finish(
                engine.store.as_ref(),
                chain,
                std::time::Duration::from_secs(engine.config.follower_wait),
            )
            .await?;

            match outcome {
                FollowerOutcome::Finished => {
                    let record = read_record(engine, chain, super::now()).await?;
                    if record.state.is_hit() {
                        Ok(serve_from_record(record, record.state, CacheAction::Collapsed))
                    } else {
                        // The leader's fetch was not cacheable; serve the same way it
                        // would have: a direct, uncoalesced origin fetch.
                        fetch_and_maybe_cache(
                            engine,
                            chain,
                            method,
                            uri,
                            request_headers,
                            request_body,
                            now,
                            CacheAction::Fetched,
                        )
                        .await
                    }
                }
                FollowerOutcome::FallBack => {
                    fetch_and_maybe_cache(
                        engine,
                        chain,
                        method,
                        uri,
                        request_headers,
                        request_body,
                        now,
                        CacheAction::Fetched,
                    )
                    .await
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn fetch_and_maybe_cache(
    engine: &CacheEngine,
    chain: &KeyChain,
    method: Method,
    uri: &Uri,
    request_headers: HeaderMap,
    request_body: Bytes,
    now: i64,
    action: CacheAction,
) -> Result<LifecycleResponse, LedgeError> {
    let origin = OriginFetcher::new(
        engine.config.upstream_host.clone(),
        engine.config.upstream_port,
    );

    let response = origin
        .fetch(method.clone(), uri, request_headers.clone(), request_body)
        .await?;

    signals::app_signals()
        .emit(Signal::new("origin_fetched"))
        .await;
    super::stats::record_origin_fetch();

    let decision = fetcher::decide_cacheability(&method, &request_headers, &response.headers, now);

    let lifecycle_response = match decision {
        CacheDecision::Cacheable { expires } => {
            let ttl = writer::compute_ttl(expires, now, engine.config.serve_when_stale, engine.config.keep_cache_for);
            writer::write(
                engine.store.as_ref(),
                engine.storage.as_ref(),
                chain,
                &uri.to_string(),
                response.status,
                &response.headers,
                response.body.clone(),
                expires,
                ttl,
            )
            .await?;

            LifecycleResponse {
                status: response.status,
                headers: response.headers,
                body: response.body,
                state: Freshness::Subzero,
                action,
            }
        }
        _ => {
            // Not cacheable: forward the origin's response unchanged (spec §7).
            LifecycleResponse {
                status: response.status,
                headers: response.headers,
                body: response.body,
                state: Freshness::Subzero,
                action: CacheAction::None,
            }
        }
    };

    Ok(lifecycle_response)
}

/// Adds the cache-observability headers spec §4.7/§6 require, overriding
/// `Content-Length` to the actual serialized body size.
pub fn decorate_headers(headers: &mut HeaderMap, hostname: &str, state: Freshness, action: CacheAction, body_len: usize) {
    let via_value = format!("1.1 {hostname} (Ledge/{})", env!("CARGO_PKG_VERSION"));
    let via = match headers.get(http::header::VIA) {
        Some(existing) if !existing.is_empty() => {
            format!("{}, {via_value}", existing.to_str().unwrap_or_default())
        }
        _ => via_value,
    };
    if let Ok(value) = HeaderValue::from_str(&via) {
        headers.insert(http::header::VIA, value);
    }

    let x_cache = if state.is_hit() { "HIT" } else { "MISS" };
    headers.insert("x-cache", HeaderValue::from_static(x_cache));
    if let Ok(value) = HeaderValue::from_str(&state.to_string()) {
        headers.insert("x-cache-state", value);
    }
    if let Ok(value) = HeaderValue::from_str(action.header_value()) {
        headers.insert("x-cache-action", value);
    }
    headers.insert(
        http::header::CONTENT_LENGTH,
        HeaderValue::from_str(&body_len.to_string()).unwrap(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{
        config::CacheConfig, jobqueue::memory::MemoryJobQueue, storage::memory::MemoryBlobStore,
        store::memory::MemoryStore,
    };
    use std::sync::Arc;

    fn test_config() -> CacheConfig {
        CacheConfig {
            serve_when_stale: 60,
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
        }
    }

    fn engine() -> CacheEngine {
        CacheEngine::new(
            test_config(),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryBlobStore::new()),
            Arc::new(MemoryJobQueue::new()),
        )
    }

    #[tokio::test]
    async fn hot_record_is_served_without_action() {
        let engine = engine();
        let chain = KeyChain::derive("GET:http://x/a");
        let now = super::super::now();

        writer::write(
            engine.store.as_ref(),
            engine.storage.as_ref(),
            &chain,
            "http://x/a",
            StatusCode::OK,
            &HeaderMap::new(),
            Bytes::from_static(b"cached"),
            now + 3600,
            3600,
        )
        .await
        .unwrap();

        let record = read_record(&engine, &chain, now).await.unwrap();
        assert_eq!(record.state, Freshness::Hot);
        assert_eq!(record.body, Some(Bytes::from_static(b"cached")));
    }

    #[tokio::test]
    async fn warm_record_enqueues_revalidate_job() {
        let engine = engine();
        let chain = KeyChain::derive("GET:http://x/b");
        let now = super::super::now();

        writer::write(
            engine.store.as_ref(),
            engine.storage.as_ref(),
            &chain,
            "http://x/b",
            StatusCode::OK,
            &HeaderMap::new(),
            Bytes::from_static(b"stale"),
            now - 10,
            // TTL already reduced, as if purged; entity & hash keys still alive
            // within serve_when_stale (60s) so classification is WARM.
            70,
        )
        .await
        .unwrap();

        let record = read_record(&engine, &chain, now).await.unwrap();
        assert_eq!(record.state, Freshness::Warm);
    }
}
