//! The Ledge cache engine: request lifecycle plus the purge/revalidate
//! subsystem (spec §1–§9).
//!
//! Module map, leaf-first (spec §2's C1–C10):
//! - [`key_chain`] (C1) — fingerprint and key-chain derivation.
//! - [`store`] (C2) — metadata store adapter (`KvStore` trait + Redis/memory).
//! - [`storage`] (C3) — body blob store adapter (`BlobStore` trait +
//!   sled/memory).
//! - [`freshness`] (C4) — SUBZERO/COLD/WARM/HOT classification.
//! - [`collapse`] (C5) — request-coalescing leader/follower protocol.
//! - [`fetcher`] (C6) — origin fetch + cacheability decision.
//! - [`writer`] (C7) — atomic multi-key cache write.
//! - [`lifecycle`] (C8) — top-level request state machine.
//! - [`purge`] (C9) — exact + wildcard purge coordinator.
//! - [`worker`] (C10) — background job consumer (purge-scan, revalidate).
//! - [`jobqueue`] — background-job queue contract (`JobQueue` trait +
//!   Redis/memory), the transport C9 and C10 share.
//! - [`config`] — runtime configuration (spec §6).
//! - [`errors`] — error taxonomy (spec §7).
//! - [`stats`] — cache-state/purge/collapse counters (spec §4.6).
//! - [`handlers`] — the HTTP-facing `GET`/`HEAD`/`PURGE` entry point (spec §6).

pub mod collapse;
pub mod config;
pub mod errors;
pub mod fetcher;
pub mod freshness;
pub mod handlers;
pub mod jobqueue;
pub mod key_chain;
pub mod lifecycle;
pub mod purge;
pub mod stats;
pub mod storage;
pub mod store;
pub mod writer;
pub mod worker;

use std::sync::Arc;

use crate::cache::{
    config::CacheConfig, jobqueue::JobQueue, storage::BlobStore, store::KvStore,
};

/// Shared dependency bundle the cache engine's request lifecycle, purge
/// coordinator, and background worker are all constructed from.
///
/// Stored once in Tako's global state (see `router::Router::state`) and
/// retrieved by handlers via `extractors::state::State<CacheEngine>`.
#[derive(Clone)]
pub struct CacheEngine {
    pub config: Arc<CacheConfig>,
    pub store: Arc<dyn KvStore>,
    pub storage: Arc<dyn BlobStore>,
    pub jobs: Arc<dyn JobQueue>,
}

impl CacheEngine {
    pub fn new(
        config: CacheConfig,
        store: Arc<dyn KvStore>,
        storage: Arc<dyn BlobStore>,
        jobs: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            storage,
            jobs,
        }
    }
}

/// Current unix-seconds timestamp, the single place the rest of the engine
/// reads "now" from (keeps classification and TTL math testable).
pub fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
