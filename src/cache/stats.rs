//! Stats counters (spec §4.6): "increments stats counters keyed by final
//! cache state string".
//!
//! Recorded through the `metrics` facade `plugins::metrics::MetricsPlugin`
//! installs a Prometheus recorder for; with the `metrics` feature disabled
//! these calls are no-ops (the `metrics` crate's macros compile to nothing
//! without a recorder installed).

use crate::cache::{freshness::Freshness, lifecycle::CacheAction};

/// Records a completed request's final cache state (spec §4.6/§4.7:
/// `MISS`, `HIT`, i.e. any [`Freshness`] rendered through its `Display`).
pub fn record_cache_state(state: Freshness) {
    #[cfg(feature = "metrics")]
    metrics::counter!("ledge_cache_state_total", "state" => state.to_string()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = state;
}

/// Records an origin fetch (spec §4.5/§4.9: every leader fetch and every
/// background revalidate).
pub fn record_origin_fetch() {
    #[cfg(feature = "metrics")]
    metrics::counter!("ledge_origin_fetch_total").increment(1);
}

/// Records a purge request by mode (spec §4.8).
pub fn record_purge(mode: &str) {
    #[cfg(feature = "metrics")]
    metrics::counter!("ledge_purge_total", "mode" => mode.to_string()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = mode;
}

/// Records a collapse role outcome (spec §4.4): `leader` performed the
/// fetch, `follower` waited and served the leader's result.
pub fn record_collapse(action: CacheAction) {
    let role = match action {
        CacheAction::Fetched => "leader",
        CacheAction::Collapsed => "follower",
        CacheAction::None => return,
    };
    #[cfg(feature = "metrics")]
    metrics::counter!("ledge_collapse_total", "role" => role).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = role;
}
