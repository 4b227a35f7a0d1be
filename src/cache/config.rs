//! Runtime configuration for the cache engine, loaded from the environment.
//!
//! Mirrors the teacher's minimal-ceremony approach to setup: no config file
//! parser, just a `serde::Deserialize` struct populated from `LEDGE_`-prefixed
//! environment variables via `envy`, with defaults matching spec §6.

use serde::Deserialize;

fn default_serve_when_stale() -> u64 {
    0
}
fn default_collapse_origin_requests() -> bool {
    true
}
fn default_keep_cache_for() -> u64 {
    3600
}
fn default_keyspace_scan_count() -> u32 {
    100
}
fn default_lock_ttl() -> u64 {
    10
}
fn default_follower_wait() -> u64 {
    2
}
fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_blob_path() -> String {
    "./ledge-data/bodies".to_string()
}

/// Cache engine configuration, recognized options from spec §6.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Grace window (seconds) during which expired entries are served WARM.
    #[serde(default = "default_serve_when_stale")]
    pub serve_when_stale: u64,

    /// Enable request collapsing (C5).
    #[serde(default = "default_collapse_origin_requests")]
    pub collapse_origin_requests: bool,

    /// Post-expiry retention (seconds) used as the TTL base for cache writes.
    #[serde(default = "default_keep_cache_for")]
    pub keep_cache_for: u64,

    /// Batch size for wildcard purge keyspace scans.
    #[serde(default = "default_keyspace_scan_count")]
    pub keyspace_scan_count: u32,

    /// Origin host.
    pub upstream_host: String,

    /// Origin port.
    pub upstream_port: u16,

    /// Fetching-lock TTL (seconds); bounds a crashed leader's blocking window.
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl: u64,

    /// How long a follower waits for the leader's publication (seconds).
    #[serde(default = "default_follower_wait")]
    pub follower_wait: u64,

    /// Address the cache's own HTTP server listens on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Connection string for the metadata store / job queue (redis://...).
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Filesystem path for the embedded body store (sled).
    #[serde(default = "default_blob_path")]
    pub blob_path: String,
}

impl CacheConfig {
    /// Loads configuration from `LEDGE_`-prefixed environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("LEDGE_").from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        // serve_when_stale default 0, collapse default true, keep_cache_for 3600
        let parsed: Result<CacheConfig, _> = envy::prefixed("LEDGE_TEST_NONEXISTENT_").from_iter(vec![
            ("LEDGE_TEST_NONEXISTENT_UPSTREAM_HOST".to_string(), "origin".to_string()),
            ("LEDGE_TEST_NONEXISTENT_UPSTREAM_PORT".to_string(), "80".to_string()),
        ]);
        let cfg = parsed.unwrap();
        assert_eq!(cfg.serve_when_stale, 0);
        assert!(cfg.collapse_origin_requests);
        assert_eq!(cfg.keep_cache_for, 3600);
        assert_eq!(cfg.keyspace_scan_count, 100);
        assert_eq!(cfg.lock_ttl, 10);
        assert_eq!(cfg.follower_wait, 2);
    }
}
