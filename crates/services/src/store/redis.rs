use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::debug;

use super::{SharedStateStore, StoreError, StoreResult};

/// Redis-backed adapter. `ConnectionManager` handles reconnects and
/// multiplexing; every call maps onto a single atomic Redis command
/// (the cap trim after a sorted append is the one two-step sequence,
/// and over-trimming is harmless for a bounded cache).
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url).map_err(from_redis)?;
        let manager = ConnectionManager::new(client).await.map_err(from_redis)?;
        debug!(%url, "Redis store connected");
        Ok(Self { manager })
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

fn from_redis(e: redis::RedisError) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl SharedStateStore for RedisStore {
    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut conn = self.conn();
        let added: i64 = conn.sadd(key, member).await.map_err(from_redis)?;
        Ok(added > 0)
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut conn = self.conn();
        let removed: i64 = conn.srem(key, member).await.map_err(from_redis)?;
        Ok(removed > 0)
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn();
        conn.smembers(key).await.map_err(from_redis)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn();
        conn.get(key).await.map_err(from_redis)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let mut conn = self.conn();
        let secs = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, value, secs).await.map_err(from_redis)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.conn();
        let _: () = conn.del(key).await.map_err(from_redis)?;
        Ok(())
    }

    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()> {
        let mut conn = self.conn();
        let _: () = conn.hset_multiple(key, fields).await.map_err(from_redis)?;
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn();
        conn.hget(key, field).await.map_err(from_redis)
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut conn = self.conn();
        conn.hgetall(key).await.map_err(from_redis)
    }

    async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        let mut conn = self.conn();
        conn.hincr(key, field, delta).await.map_err(from_redis)
    }

    async fn sorted_append(
        &self,
        key: &str,
        score: f64,
        member: &str,
        cap: Option<usize>,
    ) -> StoreResult<()> {
        let mut conn = self.conn();
        let _: () = conn.zadd(key, member, score).await.map_err(from_redis)?;
        if let Some(cap) = cap {
            let stop = -(cap as isize) - 1;
            let _: () = conn
                .zremrangebyrank(key, 0, stop)
                .await
                .map_err(from_redis)?;
        }
        Ok(())
    }

    async fn sorted_range(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        let mut conn = self.conn();
        conn.zrange(key, start, stop).await.map_err(from_redis)
    }

    async fn sorted_len(&self, key: &str) -> StoreResult<usize> {
        let mut conn = self.conn();
        let len: i64 = conn.zcard(key).await.map_err(from_redis)?;
        Ok(len as usize)
    }

    async fn counter_incr(&self, key: &str) -> StoreResult<i64> {
        let mut conn = self.conn();
        conn.incr(key, 1).await.map_err(from_redis)
    }

    async fn clear_prefix(&self, prefix: &str) -> StoreResult<()> {
        let mut conn = self.conn();
        let pattern = format!("{prefix}*");
        let keys: Vec<String> = conn.keys(pattern).await.map_err(from_redis)?;
        if !keys.is_empty() {
            let _: () = conn.del(keys).await.map_err(from_redis)?;
        }
        Ok(())
    }
}
