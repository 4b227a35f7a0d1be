//! Error taxonomy for the cache engine.
//!
//! Distinct categories mirror the distinctions the request lifecycle must act
//! on differently: a store outage fails the request, a storage miss degrades
//! to a fetch, an origin failure on the critical path is forwarded unchanged.

use http::StatusCode;

use crate::{responder::Responder, types::Response};

/// Errors raised by the [`crate::cache::store::KvStore`] adapter.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("key-value store unavailable: {0}")]
    Unavailable(String),
    #[error("key-value store returned an unexpected reply: {0}")]
    UnexpectedReply(String),
}

/// Errors raised by the [`crate::cache::storage::BlobStore`] adapter.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("body storage unavailable: {0}")]
    Unavailable(String),
    #[error("body storage entity not found: {0}")]
    NotFound(String),
}

/// Errors raised while fetching from the upstream origin.
#[derive(Debug, thiserror::Error)]
pub enum OriginError {
    #[error("origin connection failed: {0}")]
    Connect(String),
    #[error("origin request failed: {0}")]
    Request(String),
}

/// Top-level error type for the cache engine, convertible into an HTTP response.
#[derive(Debug, thiserror::Error)]
pub enum LedgeError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Origin(#[from] OriginError),

    /// A follower did not observe a `"finished"`/`"failed"` publication in time.
    #[error("timed out waiting for the collapsing leader")]
    CoalesceTimeout,

    /// No entry exists for the purge target.
    #[error("no cache entry for purge target")]
    PurgeTargetMissing,
}

impl Responder for LedgeError {
    fn into_response(self) -> Response {
        let status = match &self {
            LedgeError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LedgeError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LedgeError::Origin(_) => StatusCode::BAD_GATEWAY,
            LedgeError::CoalesceTimeout => StatusCode::BAD_GATEWAY,
            LedgeError::PurgeTargetMissing => StatusCode::NOT_FOUND,
        };
        (status, self.to_string()).into_response()
    }
}
