//! Integration tests for the origin fetcher (C6) against a real HTTP server,
//! per `SPEC_FULL.md`'s ambient test-tooling section: `mockito` stands in for
//! the upstream origin the same way the pack's own HTTP-cache example repos
//! exercise their fetchers, rather than asserting only against hand-built
//! `HeaderMap`s.

use bytes::Bytes;
use http::{HeaderMap, Method};

use ledge::cache::fetcher::{decide_cacheability, CacheDecision, OriginFetcher};

fn split_host_port(host_with_port: &str) -> (String, u16) {
    let (host, port) = host_with_port.rsplit_once(':').expect("host:port");
    (host.to_string(), port.parse().expect("numeric port"))
}

#[tokio::test]
async fn fetch_reaches_a_real_server_and_cacheability_follows_its_headers() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/cached")
        .with_status(200)
        .with_header("cache-control", "max-age=120")
        .with_body("TEST1")
        .create_async()
        .await;

    let (host, port) = split_host_port(&server.host_with_port());
    let fetcher = OriginFetcher::new(host, port);
    let uri: http::Uri = "/cached".parse().unwrap();

    let response = fetcher
        .fetch(Method::GET, &uri, HeaderMap::new(), Bytes::new())
        .await
        .expect("origin reachable");

    assert_eq!(response.status, http::StatusCode::OK);
    assert_eq!(response.body, Bytes::from_static(b"TEST1"));

    let now = 1_000;
    let decision = decide_cacheability(&Method::GET, &HeaderMap::new(), &response.headers, now);
    assert_eq!(decision, CacheDecision::Cacheable { expires: now + 120 });

    mock.assert_async().await;
}

#[tokio::test]
async fn no_store_response_is_forwarded_but_not_cacheable() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/private")
        .with_status(200)
        .with_header("cache-control", "max-age=60, no-store")
        .with_body("SECRET")
        .create_async()
        .await;

    let (host, port) = split_host_port(&server.host_with_port());
    let fetcher = OriginFetcher::new(host, port);
    let uri: http::Uri = "/private".parse().unwrap();

    let response = fetcher
        .fetch(Method::GET, &uri, HeaderMap::new(), Bytes::new())
        .await
        .expect("origin reachable");

    assert_eq!(response.body, Bytes::from_static(b"SECRET"));
    let decision = decide_cacheability(&Method::GET, &HeaderMap::new(), &response.headers, 1_000);
    assert_eq!(decision, CacheDecision::NotCacheable);
}

#[tokio::test]
async fn connect_failure_surfaces_as_origin_error() {
    // Nothing is listening on this port; the connection attempt must fail
    // cleanly rather than hang the request lifecycle.
    let fetcher = OriginFetcher::new("127.0.0.1".to_string(), 1);
    let uri: http::Uri = "/anything".parse().unwrap();

    let result = fetcher
        .fetch(Method::GET, &uri, HeaderMap::new(), Bytes::new())
        .await;

    assert!(result.is_err());
}
