//! Key chain derivation (C1): the set of co-located KV keys for a fingerprint.
//!
//! Pure, deterministic, no I/O. Suffixes are fixed and cannot collide with a
//! user-controlled root string because the root itself is always prefixed.

/// The set of keys derived from a request fingerprint ("root").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChain {
    /// The fingerprint this chain was derived from.
    pub root: String,
    /// Metadata record: status, expires, uri, entity, `h:<header>` fields.
    pub main: String,
    /// Set of entity ids ever written for this fingerprint (GC bookkeeping).
    pub entities: String,
    /// Ephemeral collapse lock; present only while a fetch is in flight.
    pub fetching_lock: String,
    /// Set of pending subscribers/replicas for wildcard revalidation tracking.
    pub repset: String,
}

impl KeyChain {
    /// Derives the full key chain for a fingerprint.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ledge::cache::key_chain::KeyChain;
    ///
    /// let chain = KeyChain::derive("GET:http://example.com/a");
    /// assert_eq!(chain.main, "ledge:GET:http://example.com/a:main");
    /// assert_eq!(chain.entities, "ledge:GET:http://example.com/a:entities");
    /// ```
    pub fn derive(root: &str) -> Self {
        Self {
            root: root.to_string(),
            main: format!("ledge:{root}:main"),
            entities: format!("ledge:{root}:entities"),
            fetching_lock: format!("ledge:{root}:fetching_lock"),
            repset: format!("ledge:{root}:repset"),
        }
    }

    /// All keys in the chain except `fetching_lock`, which manages its own TTL.
    ///
    /// This is the set `expire_keys` (C9) and the cache writer (C7) operate on.
    pub fn ttl_bearing_keys(&self) -> [&str; 3] {
        [&self.main, &self.entities, &self.repset]
    }
}

/// Derives the canonical fingerprint (cache key root) for a request.
///
/// Method + scheme + host + path + normalized (sorted) query string, per
/// spec §3. Header-based vary expansion is left to callers that need it.
pub fn fingerprint(method: &http::Method, uri: &http::Uri) -> String {
    let scheme = uri.scheme_str().unwrap_or("http");
    let authority = uri.authority().map(|a| a.as_str()).unwrap_or("");
    let path = uri.path();
    let query = normalize_query(uri.query().unwrap_or(""));

    if query.is_empty() {
        format!("{method}:{scheme}://{authority}{path}")
    } else {
        format!("{method}:{scheme}://{authority}{path}?{query}")
    }
}

/// Sorts query parameters by their raw key=value pair so that `?b=2&a=1` and
/// `?a=1&b=2` derive the same fingerprint.
fn normalize_query(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }
    let mut pairs: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
    pairs.sort_unstable();
    pairs.join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic_and_collision_free() {
        let a = KeyChain::derive("GET:/a");
        let b = KeyChain::derive("GET:/a");
        assert_eq!(a, b);

        let c = KeyChain::derive("GET:/b");
        assert_ne!(a.main, c.main);
        assert_ne!(a.main, a.entities);
        assert_ne!(a.main, a.fetching_lock);
        assert_ne!(a.main, a.repset);
    }

    #[test]
    fn fingerprint_normalizes_query_order() {
        let uri1: http::Uri = "http://example.com/p?b=2&a=1".parse().unwrap();
        let uri2: http::Uri = "http://example.com/p?a=1&b=2".parse().unwrap();
        assert_eq!(
            fingerprint(&http::Method::GET, &uri1),
            fingerprint(&http::Method::GET, &uri2)
        );
    }
}
