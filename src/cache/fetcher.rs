//! Origin fetcher (C6, spec §4.5): issues the upstream request and decides
//! cacheability.
//!
//! Grounded on `client.rs`'s `TakoClient` (a fresh HTTP/1.1 connection per
//! call keeps this simple and matches the teacher's own client examples;
//! connection pooling policy is an explicit Non-goal, spec §1).

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use http_body_util::Full;

use crate::client::TakoClient;
use crate::cache::errors::OriginError;

/// The raw upstream response, before any cacheability decision is applied.
pub struct OriginResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Whether (and for how long) a fetched response may be cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    /// Cacheable until the given unix-seconds expiry.
    Cacheable { expires: i64 },
    NotCacheable,
}

/// Issues a single upstream request to `upstream_host:upstream_port`.
pub struct OriginFetcher {
    pub upstream_host: String,
    pub upstream_port: u16,
}

impl OriginFetcher {
    pub fn new(upstream_host: impl Into<String>, upstream_port: u16) -> Self {
        Self {
            upstream_host: upstream_host.into(),
            upstream_port,
        }
    }

    /// Fetches `method uri` from the origin, forwarding `headers` and `body`.
    pub async fn fetch(
        &self,
        method: Method,
        uri: &Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<OriginResponse, OriginError> {
        let mut client = TakoClient::<Full<Bytes>>::new(&self.upstream_host, Some(self.upstream_port))
            .await
            .map_err(|e| OriginError::Connect(e.to_string()))?;

        let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
        let mut builder = http::Request::builder().method(method).uri(path_and_query);
        for (name, value) in headers.iter() {
            builder = builder.header(name, value);
        }
        let request = builder
            .body(Full::new(body))
            .map_err(|e| OriginError::Request(e.to_string()))?;

        let response = client
            .request(request)
            .await
            .map_err(|e| OriginError::Request(e.to_string()))?;

        let (parts, body) = response.into_parts();
        Ok(OriginResponse {
            status: parts.status,
            headers: parts.headers,
            body: Bytes::from(body),
        })
    }
}

/// `Cache-Control`/`Pragma` directives that forbid caching a response, or
/// that force a request to bypass the cache entirely (spec §4.5).
fn has_directive(headers: &HeaderMap, name: &str, directive: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.split(',').any(|tok| tok.trim().eq_ignore_ascii_case(directive)))
}

/// Whether the *request* carries a cache-bypass header (spec §6): forces an
/// origin fetch and disables caching for that request.
pub fn request_bypasses_cache(headers: &HeaderMap) -> bool {
    has_directive(headers, "pragma", "no-cache") || has_directive(headers, "cache-control", "no-cache")
}

/// Parses `Cache-Control: max-age=N` into an absolute expiry (`now + N`).
fn max_age_expires(headers: &HeaderMap, now: i64) -> Option<i64> {
    headers.get_all("cache-control").iter().find_map(|v| {
        let v = v.to_str().ok()?;
        v.split(',').find_map(|tok| {
            let tok = tok.trim();
            let rest = tok.strip_prefix("max-age=")?;
            let secs: i64 = rest.trim().parse().ok()?;
            Some(now + secs.max(0))
        })
    })
}

/// Parses the `Expires` header into a unix-seconds timestamp.
fn expires_header(headers: &HeaderMap) -> Option<i64> {
    let raw = headers.get("expires")?.to_str().ok()?;
    let when = httpdate::parse_http_date(raw).ok()?;
    Some(
        when
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0),
    )
}

/// Applies the RFC 7234 subset of spec §4.5 to decide whether, and until
/// when, a response may be cached.
///
/// Method must be GET (checked by the caller before invoking this — HEAD
/// may be fetched but is never cached, spec §4.5). `request_headers` are the
/// *client* request's headers (checked for a bypass directive);
/// `response_headers` are the origin's.
pub fn decide_cacheability(
    method: &Method,
    request_headers: &HeaderMap,
    response_headers: &HeaderMap,
    now: i64,
) -> CacheDecision {
    if method != Method::GET {
        return CacheDecision::NotCacheable;
    }
    if request_bypasses_cache(request_headers) {
        return CacheDecision::NotCacheable;
    }
    if has_directive(response_headers, "pragma", "no-cache") {
        return CacheDecision::NotCacheable;
    }
    for forbidden in ["no-cache", "no-store", "must-revalidate", "private"] {
        if has_directive(response_headers, "cache-control", forbidden) {
            return CacheDecision::NotCacheable;
        }
    }

    match max_age_expires(response_headers, now).or_else(|| expires_header(response_headers)) {
        Some(expires) if expires > now => CacheDecision::Cacheable { expires },
        _ => CacheDecision::NotCacheable,
    }
}

/// Builds the `h:<name>` metadata fields carried through C7, preserving the
/// origin's header capitalization (spec §6).
pub fn header_fields(headers: &HeaderMap) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .filter_map(|v: &HeaderValue| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(", ");
        fields.push((format!("h:{name}"), joined));
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(
                http::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    #[test]
    fn max_age_wins_over_absent_expires() {
        let resp = headers(&[("cache-control", "max-age=60")]);
        let decision = decide_cacheability(&Method::GET, &HeaderMap::new(), &resp, 1000);
        assert_eq!(decision, CacheDecision::Cacheable { expires: 1060 });
    }

    #[test]
    fn no_store_forbids_caching() {
        let resp = headers(&[("cache-control", "max-age=60, no-store")]);
        let decision = decide_cacheability(&Method::GET, &HeaderMap::new(), &resp, 1000);
        assert_eq!(decision, CacheDecision::NotCacheable);
    }

    #[test]
    fn request_no_cache_bypasses() {
        let req = headers(&[("cache-control", "no-cache")]);
        let resp = headers(&[("cache-control", "max-age=60")]);
        let decision = decide_cacheability(&Method::GET, &req, &resp, 1000);
        assert_eq!(decision, CacheDecision::NotCacheable);
    }

    #[test]
    fn non_get_is_never_cacheable() {
        let resp = headers(&[("cache-control", "max-age=60")]);
        let decision = decide_cacheability(&Method::POST, &HeaderMap::new(), &resp, 1000);
        assert_eq!(decision, CacheDecision::NotCacheable);
    }

    #[test]
    fn missing_freshness_info_is_not_cacheable() {
        let decision = decide_cacheability(&Method::GET, &HeaderMap::new(), &HeaderMap::new(), 1000);
        assert_eq!(decision, CacheDecision::NotCacheable);
    }
}
