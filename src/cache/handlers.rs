//! HTTP-facing handlers wiring the cache engine into a [`crate::router::Router`]
//! (spec §6's "Client-facing HTTP surface"): `GET`/`HEAD` run the request
//! lifecycle (C8); `PURGE` dispatches to the purge coordinator (C9).

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri, header::CONTENT_TYPE};
use http_body_util::{BodyExt, Full};

use crate::{
    body::TakoBody,
    cache::{key_chain, lifecycle, purge::PurgeMode, CacheEngine},
    extractors::state::State,
    responder::Responder,
    types::{Request, Response},
};

use super::purge;

fn purge_method() -> Method {
    Method::from_bytes(b"PURGE").expect("PURGE is a valid method token")
}

/// Resolves the absolute URI the fingerprint and purge targets are derived
/// from: the incoming request's path/query paired with its `Host` header,
/// falling back to the `listen_addr` when the client omitted one.
fn absolute_uri(headers: &HeaderMap, uri: &Uri, listen_addr: &str) -> Uri {
    let host = headers
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(listen_addr);
    let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

    Uri::builder()
        .scheme("http")
        .authority(host)
        .path_and_query(path_and_query)
        .build()
        .unwrap_or_else(|_| uri.clone())
}

/// Single entry point registered for every method the cache understands.
/// Tako's router matches by exact method, so the binary registers this
/// handler once per method on the catch-all path.
pub async fn serve(State(engine): State<CacheEngine>, req: &mut Request) -> Response {
    let method = req.method().clone();
    let headers = req.headers().clone();
    let uri = absolute_uri(&headers, req.uri(), &engine.config.listen_addr);

    if method == purge_method() {
        return handle_purge(&engine, &uri, &headers).await;
    }

    if method != Method::GET && method != Method::HEAD {
        return (StatusCode::METHOD_NOT_ALLOWED, "method not supported").into_response();
    }

    let body = req
        .body_mut()
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .unwrap_or_default();

    match lifecycle::handle(&engine, method.clone(), &uri, headers, body).await {
        Ok(mut response) => {
            lifecycle::decorate_headers(
                &mut response.headers,
                &engine.config.listen_addr,
                response.state,
                response.action,
                response.body.len(),
            );
            let body = if method == Method::HEAD {
                Bytes::new()
            } else {
                response.body
            };
            let mut builder = http::Response::builder().status(response.status);
            *builder.headers_mut().unwrap() = response.headers;
            builder
                .body(TakoBody::new(Full::from(body)))
                .unwrap_or_else(|_| (StatusCode::INTERNAL_SERVER_ERROR, "").into_response())
        }
        Err(err) => err.into_response(),
    }
}

async fn handle_purge(engine: &CacheEngine, uri: &Uri, headers: &HeaderMap) -> Response {
    let mode = PurgeMode::from_header(
        headers
            .get("x-purge")
            .and_then(|v| v.to_str().ok()),
    );
    let root = key_chain::fingerprint(&Method::GET, uri);

    let result = if uri.path().contains('*') {
        purge::purge_wildcard(engine, &root, mode).await
    } else {
        purge::purge_exact(engine, &root, mode).await
    };

    match result {
        Ok(outcome) => {
            let status = outcome.status();
            let body = serde_json::to_vec(&outcome).unwrap_or_default();
            http::Response::builder()
                .status(status)
                .header(CONTENT_TYPE, "application/json")
                .body(TakoBody::new(Full::from(Bytes::from(body))))
                .unwrap_or_else(|_| (StatusCode::INTERNAL_SERVER_ERROR, "").into_response())
        }
        Err(err) => crate::cache::errors::LedgeError::from(err).into_response(),
    }
}
