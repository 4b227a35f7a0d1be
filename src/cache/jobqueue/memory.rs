//! In-memory [`super::JobQueue`] binding for tests and single-process runs.

use std::{
    collections::BinaryHeap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::cache::errors::StoreError;

use super::{Job, JobQueue};

struct Entry {
    priority: i32,
    seq: u64,
    job: Job,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for Entry {}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Higher priority first; lower seq (older) first within the same priority.
        self
            .priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct Inner {
    heap: BinaryHeap<Entry>,
    seen: std::collections::HashSet<String>,
    next_seq: u64,
}

/// In-memory job queue. Cheaply `Clone`d; all instances share state.
#[derive(Clone)]
pub struct MemoryJobQueue {
    inner: Arc<Mutex<Inner>>,
    notify: Arc<Notify>,
}

impl Default for MemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            notify: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: Job) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().expect("job queue mutex poisoned");
        if !inner.seen.insert(job.jid.clone()) {
            return Ok(false);
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(Entry {
            priority: job.priority,
            seq,
            job,
        });
        drop(inner);
        self.notify.notify_one();
        Ok(true)
    }

    async fn dequeue(&self, timeout: std::time::Duration) -> Result<Option<Job>, StoreError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut inner = self.inner.lock().expect("job queue mutex poisoned");
                if let Some(entry) = inner.heap.pop() {
                    inner.seen.remove(&entry.job.jid);
                    return Ok(Some(entry.job));
                }
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let _ = tokio::time::timeout(remaining, self.notify.notified()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::jobqueue::JobClass;

    #[tokio::test]
    async fn dedups_by_jid() {
        let q = MemoryJobQueue::new();
        assert!(q
            .enqueue(Job::new(JobClass::PurgeScan, "x".into(), serde_json::json!({})))
            .await
            .unwrap());
        assert!(!q
            .enqueue(Job::new(JobClass::PurgeScan, "x".into(), serde_json::json!({})))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn dequeue_returns_highest_priority_first() {
        let q = MemoryJobQueue::new();
        q.enqueue(Job::new(JobClass::Revalidate, "r".into(), serde_json::json!({})))
            .await
            .unwrap();
        q.enqueue(Job::new(JobClass::PurgeScan, "p".into(), serde_json::json!({})))
            .await
            .unwrap();
        let first = q.dequeue(std::time::Duration::from_millis(10)).await.unwrap().unwrap();
        assert_eq!(first.jid, "p");
    }

    #[tokio::test]
    async fn dequeue_times_out_when_empty() {
        let q = MemoryJobQueue::new();
        let job = q.dequeue(std::time::Duration::from_millis(20)).await.unwrap();
        assert!(job.is_none());
    }
}
