//! Background-job queue contract (spec §6, §9): deterministic ids, tags,
//! priorities, durable re-queue on timeout.
//!
//! If the underlying queue lacks deterministic ids, wrap it with a dedup
//! table keyed by the intended id (spec §9) — the Redis binding does exactly
//! this via a `SETNX`-guarded dedup entry alongside the `LPUSH`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cache::errors::StoreError;

pub mod memory;
pub mod redis_queue;

/// Job class, used both as the queue name and the purge/revalidate dispatch tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobClass {
    /// Wildcard purge keyspace scan.
    PurgeScan,
    /// Background re-fetch of a single fingerprint.
    Revalidate,
}

impl JobClass {
    pub fn klass_name(self) -> &'static str {
        match self {
            JobClass::PurgeScan => "ledge.jobs.purge",
            JobClass::Revalidate => "ledge.jobs.revalidate",
        }
    }

    /// Default priority (higher runs first); spec §4.9: purge=5, revalidate=4.
    pub fn priority(self) -> i32 {
        match self {
            JobClass::PurgeScan => 5,
            JobClass::Revalidate => 4,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            JobClass::PurgeScan => "purge",
            JobClass::Revalidate => "revalidate",
        }
    }
}

/// A queued unit of work (spec §6 job queue contract).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub klass: JobClass,
    /// Deterministic 32-hex id, e.g. `md5("purge:" + root)`.
    pub jid: String,
    pub priority: i32,
    pub tags: Vec<String>,
    pub payload: serde_json::Value,
}

impl Job {
    pub fn new(klass: JobClass, jid: String, payload: serde_json::Value) -> Self {
        Self {
            klass,
            priority: klass.priority(),
            tags: vec![klass.tag().to_string()],
            jid,
            payload,
        }
    }
}

/// Contract for the background-job queue (spec §6, §9).
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueues `job`. Returns `true` if this is a new job, `false` if a job
    /// with the same `jid` was already queued (idempotent dedup, spec §4.8's
    /// wildcard-purge collapsing requirement).
    async fn enqueue(&self, job: Job) -> Result<bool, StoreError>;

    /// Blocks up to `timeout` for the next job, highest priority first.
    async fn dequeue(&self, timeout: std::time::Duration) -> Result<Option<Job>, StoreError>;
}

fn digest_id(s: &str) -> String {
    use md_5::{Digest, Md5};
    let mut hasher = Md5::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

/// Computes the deterministic job id for a purge-scan job (spec §4.8).
pub fn purge_job_id(root: &str) -> String {
    digest_id(&format!("purge:{root}"))
}

/// Computes the deterministic job id for a revalidate job (spec §4.8).
pub fn revalidate_job_id(root: &str) -> String {
    digest_id(&format!("revalidate:{root}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_are_deterministic_and_distinct() {
        assert_eq!(purge_job_id("example.com"), purge_job_id("example.com"));
        assert_ne!(purge_job_id("example.com"), revalidate_job_id("example.com"));
        assert_eq!(purge_job_id("a").len(), 32);
    }
}
