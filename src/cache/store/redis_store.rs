//! Redis binding for [`super::KvStore`].
//!
//! Grounded on the `redis` crate idioms used elsewhere in the retrieval pack
//! (`AsyncCommands`, `redis::pipe()` for transactions, `SET ... NX EX` for
//! the fetching lock, `get_async_pubsub()` for publish/subscribe, `SCAN` with
//! a cursor for the wildcard purge scan).

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::{AsyncCommands, Client, aio::ConnectionManager};

use crate::cache::errors::StoreError;

use super::{KvStore, StoreOp};

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::UnexpectedReply(err.to_string())
        }
    }
}

/// Production [`KvStore`] binding over Redis.
#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    manager: ConnectionManager,
}

impl RedisStore {
    /// Connects to `redis_url`, establishing the multiplexed async connection.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)
            .map_err(|e| StoreError::Unavailable(format!("invalid redis url: {e}")))?;
        let manager = client.get_connection_manager().await?;
        Ok(Self { client, manager })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.manager.clone();
        let map: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(map)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.hget(key, field).await?;
        Ok(value)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.manager.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let mut conn = self.manager.clone();
        let ttl: i64 = conn.ttl(key).await?;
        // Redis returns -2 (no key) or -1 (no TTL) as sentinels.
        Ok(if ttl < 0 { None } else { Some(ttl) })
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.manager.clone();
        let members: Vec<String> = conn.smembers(key).await?;
        Ok(members)
    }

    async fn transact(&self, ops: Vec<StoreOp>) -> Result<(), StoreError> {
        if ops.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();

        for op in &ops {
            match op {
                StoreOp::HSet { key, fields } => {
                    if !fields.is_empty() {
                        pipe.hset_multiple(key, fields);
                    }
                }
                StoreOp::SAdd { key, member } => {
                    pipe.sadd(key, member);
                }
                StoreOp::Expire { key, ttl_secs } => {
                    pipe.expire(key, *ttl_secs);
                }
                StoreOp::ZAdd { key, score, member } => {
                    pipe.zadd(key, member, *score);
                }
                StoreOp::Del { key } => {
                    pipe.del(key);
                }
            }
            pipe.ignore();
        }

        let mut conn = self.manager.clone();
        let (): () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn try_acquire_lock(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        let mut conn = self.manager.clone();
        let acquired: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(acquired.is_some())
    }

    async fn del_many(&self, keys: &[String]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.manager.clone();
        let _: i64 = conn.del(keys).await?;
        Ok(())
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let _: i64 = conn.publish(channel, message).await?;
        Ok(())
    }

    async fn subscribe_wait(
        &self,
        channel: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        let mut stream = pubsub.on_message();

        match tokio::time::timeout(timeout, stream.next()).await {
            Ok(Some(msg)) => {
                let payload: String = msg.get_payload().unwrap_or_default();
                Ok(Some(payload))
            }
            Ok(None) => Ok(None),
            Err(_) => Ok(None),
        }
    }

    async fn scan(
        &self,
        pattern: &str,
        cursor: u64,
        count: u32,
    ) -> Result<(u64, Vec<String>), StoreError> {
        let mut conn = self.manager.clone();
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;
        Ok((next, keys))
    }
}
