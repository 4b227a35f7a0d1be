//! Freshness evaluator (C4): classifies a metadata record against `now`.
//!
//! Pure classification logic, no I/O — given an optional `expires` (absent
//! when there is no metadata record, or when the referenced entity is
//! missing from body storage) and the configured `serve_when_stale` window.

use std::fmt;

/// Cache freshness state of a fetched (or absent) metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No metadata, or the metadata's entity is missing from body storage.
    Subzero,
    /// Expired beyond the `serve_when_stale` grace window; treated as a miss.
    Cold,
    /// Expired but within the grace window; served immediately, revalidated async.
    Warm,
    /// Not yet expired.
    Hot,
}

impl Freshness {
    /// Whether this state is servable directly from cache (WARM or HOT).
    pub fn is_hit(self) -> bool {
        matches!(self, Freshness::Warm | Freshness::Hot)
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Freshness::Subzero => "SUBZERO",
            Freshness::Cold => "COLD",
            Freshness::Warm => "WARM",
            Freshness::Hot => "HOT",
        };
        f.write_str(s)
    }
}

/// Classifies a record given its `expires` (unix seconds), if any, the
/// entity's presence in body storage, `now`, and the `serve_when_stale`
/// grace window (seconds).
///
/// Boundary values are inclusive of WARM: `expires == now` is WARM when
/// `serve_when_stale > 0`, else COLD.
pub fn classify(
    expires: Option<i64>,
    entity_present: bool,
    now: i64,
    serve_when_stale: u64,
) -> Freshness {
    let expires = match expires {
        Some(e) if entity_present => e,
        _ => return Freshness::Subzero,
    };

    let stale_window = serve_when_stale as i64;

    if expires <= now - stale_window {
        Freshness::Cold
    } else if expires <= now && now < expires + stale_window {
        Freshness::Warm
    } else if expires <= now {
        // expires == now and stale_window == 0: falls through to COLD per tie-break rule.
        Freshness::Cold
    } else {
        Freshness::Hot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_metadata_is_subzero() {
        assert_eq!(classify(None, false, 1000, 0), Freshness::Subzero);
    }

    #[test]
    fn missing_entity_is_subzero_even_with_metadata() {
        assert_eq!(classify(Some(2000), false, 1000, 60), Freshness::Subzero);
    }

    #[test]
    fn not_yet_expired_is_hot() {
        assert_eq!(classify(Some(2000), true, 1000, 0), Freshness::Hot);
    }

    #[test]
    fn expired_past_grace_window_is_cold() {
        assert_eq!(classify(Some(900), true, 1000, 60), Freshness::Cold);
    }

    #[test]
    fn expired_within_grace_window_is_warm() {
        assert_eq!(classify(Some(950), true, 1000, 60), Freshness::Warm);
    }

    #[test]
    fn boundary_expires_equals_now_with_grace_is_warm() {
        assert_eq!(classify(Some(1000), true, 1000, 60), Freshness::Warm);
    }

    #[test]
    fn boundary_expires_equals_now_without_grace_is_cold() {
        assert_eq!(classify(Some(1000), true, 1000, 0), Freshness::Cold);
    }
}
