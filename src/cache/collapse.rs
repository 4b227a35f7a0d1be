//! Collapse coordinator (C5, spec §4.4): coalesces concurrent misses for the
//! same fingerprint into a single origin fetch.
//!
//! Grounded on `plugins/idempotency.rs`'s leader/follower shape (an
//! in-flight entry that later-arriving requests wait on via `Notify`), but
//! promoted to a cross-process protocol: the KV store's `SETNX` lock is the
//! correctness anchor and pub/sub is the wakeup signal, exactly as spec §9
//! requires ("pub/sub as the cross-worker correctness anchor"). No in-process
//! lock is held across an await point (spec §5).

use std::time::Duration;

use crate::cache::{errors::StoreError, key_chain::KeyChain, store::KvStore};

/// Outcome of [`try_acquire`].
pub enum Role {
    /// This caller holds `fetching_lock` and must perform the origin fetch.
    Leader,
    /// Another caller holds the lock; this caller should wait on [`await_finish`].
    Follower,
}

/// Attempts to become the leader for `chain.root`'s fetch.
pub async fn try_acquire(
    store: &dyn KvStore,
    chain: &KeyChain,
    lock_ttl_secs: u64,
) -> Result<Role, StoreError> {
    if store.try_acquire_lock(&chain.fetching_lock, lock_ttl_secs).await? {
        Ok(Role::Leader)
    } else {
        Ok(Role::Follower)
    }
}

/// Leader-side completion: releases the lock and notifies followers.
///
/// Must be called only after the cache write (C7) has committed, so that any
/// follower waking on `"finished"` is guaranteed to observe the new entry.
pub async fn finish_leader(
    store: &dyn KvStore,
    chain: &KeyChain,
    succeeded: bool,
) -> Result<(), StoreError> {
    store.del_many(std::slice::from_ref(&chain.fetching_lock)).await?;
    let message = if succeeded { "finished" } else { "failed" };
    store.publish(&chain.root, message).await
}

/// Outcome of [`await_finish`].
#[derive(Debug, PartialEq, Eq)]
pub enum FollowerOutcome {
    /// The leader finished; the follower should re-read the cache and serve it.
    Finished,
    /// The leader failed, or the wait timed out / lost the subscription; the
    /// follower should fall back to its own uncoalesced origin fetch.
    FallBack,
}

/// Follower-side wait: subscribes to `chain.root` and waits up to
/// `follower_wait` for the leader's publish.
pub async fn await_finish(
    store: &dyn KvStore,
    chain: &KeyChain,
    follower_wait: Duration,
) -> Result<FollowerOutcome, StoreError> {
    match store.subscribe_wait(&chain.root, follower_wait).await? {
        Some(msg) if msg == "finished" => Ok(FollowerOutcome::Finished),
        _ => Ok(FollowerOutcome::FallBack),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::memory::MemoryStore;

    #[tokio::test]
    async fn second_caller_becomes_follower_until_leader_finishes() {
        let store = MemoryStore::new();
        let chain = KeyChain::derive("example.com/a");

        assert!(matches!(try_acquire(&store, &chain, 10).await.unwrap(), Role::Leader));
        assert!(matches!(try_acquire(&store, &chain, 10).await.unwrap(), Role::Follower));

        let store2 = store.clone();
        let chain2 = KeyChain::derive("example.com/a");
        let waiter = tokio::spawn(async move {
            await_finish(&store2, &chain2, Duration::from_millis(200)).await.unwrap()
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        finish_leader(&store, &chain, true).await.unwrap();

        assert_eq!(waiter.await.unwrap(), FollowerOutcome::Finished);
    }

    #[tokio::test]
    async fn follower_falls_back_on_timeout() {
        let store = MemoryStore::new();
        let chain = KeyChain::derive("example.com/b");
        assert!(matches!(try_acquire(&store, &chain, 10).await.unwrap(), Role::Leader));

        let outcome = await_finish(&store, &chain, Duration::from_millis(20)).await.unwrap();
        assert_eq!(outcome, FollowerOutcome::FallBack);
    }
}
