pub mod keys;
mod memory;
mod redis;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use redis::RedisStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend unreachable: {0}")]
    Unavailable(String),
    #[error("malformed entry: {0}")]
    Corrupt(String),
}

/// Atomic primitives every hot-state backend must provide.
///
/// All "current" room state lives behind this contract: participant
/// sets, document hashes, cursor marks, and the bounded message/stroke
/// caches. Mutations to one shared entity are serialized here rather
/// than through in-process locks, because several dispatcher processes
/// may share one backend. Calls complete in bounded time; an
/// unreachable backend surfaces as `StoreError::Unavailable`, never a
/// hang. Ordered structures return elements in score order, ties by
/// insertion.
#[async_trait]
pub trait SharedStateStore: Send + Sync {
    /// Adds to a set; returns true if the member was not yet present.
    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool>;
    /// Removes from a set; returns true if the member was present.
    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool>;
    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;
    async fn delete(&self, key: &str) -> StoreResult<()>;

    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()>;
    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>>;
    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>>;
    /// Atomic per-field increment; the optimistic-lock token of the
    /// code editor rides on this being race-free across processes.
    async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64>;

    /// Appends to a score-ordered log, optionally evicting the oldest
    /// entries beyond `cap`.
    async fn sorted_append(
        &self,
        key: &str,
        score: f64,
        member: &str,
        cap: Option<usize>,
    ) -> StoreResult<()>;
    /// Range read in score order; negative indices count from the end
    /// (`0, -1` is the whole log).
    async fn sorted_range(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>>;
    async fn sorted_len(&self, key: &str) -> StoreResult<usize>;

    /// Monotonic per-key counter, used for append sequence numbers.
    async fn counter_incr(&self, key: &str) -> StoreResult<i64>;

    /// Drops every key under a prefix; used when a room is
    /// deactivated and its hot state is cleared.
    async fn clear_prefix(&self, prefix: &str) -> StoreResult<()>;
}
