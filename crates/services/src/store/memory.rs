use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{SharedStateStore, StoreError, StoreResult};

/// In-memory adapter for tests and single-process deployments.
///
/// Expiry is time-indexed: a min-heap of `(deadline, key)` is drained
/// on each operation instead of scanning every entry on read. A heap
/// entry is stale when the key has since been rewritten with a newer
/// deadline; stale entries are skipped on pop.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    sets: HashMap<String, HashSet<String>>,
    strings: HashMap<String, String>,
    deadlines: HashMap<String, Instant>,
    expiry: BinaryHeap<Reverse<(Instant, String)>>,
    hashes: HashMap<String, HashMap<String, String>>,
    sorted: HashMap<String, Vec<(f64, String)>>,
    counters: HashMap<String, i64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn purge_expired(&mut self) {
        let now = Instant::now();
        while let Some(Reverse((deadline, _))) = self.expiry.peek() {
            if *deadline > now {
                break;
            }
            let Some(Reverse((deadline, key))) = self.expiry.pop() else {
                break;
            };
            match self.deadlines.get(&key) {
                Some(current) if *current == deadline => {
                    self.deadlines.remove(&key);
                    self.strings.remove(&key);
                }
                // Rewritten since this entry was pushed; skip.
                _ => {}
            }
        }
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("memory store lock poisoned".to_string())
}

#[async_trait]
impl SharedStateStore for MemoryStore {
    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().map_err(|_| poisoned())?;
        Ok(inner
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().map_err(|_| poisoned())?;
        Ok(inner
            .sets
            .get_mut(key)
            .map(|s| s.remove(member))
            .unwrap_or(false))
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let inner = self.inner.lock().map_err(|_| poisoned())?;
        Ok(inner
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut inner = self.inner.lock().map_err(|_| poisoned())?;
        inner.purge_expired();
        Ok(inner.strings.get(key).cloned())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let mut inner = self.inner.lock().map_err(|_| poisoned())?;
        inner.purge_expired();
        let deadline = Instant::now() + ttl;
        inner.strings.insert(key.to_string(), value.to_string());
        inner.deadlines.insert(key.to_string(), deadline);
        inner.expiry.push(Reverse((deadline, key.to_string())));
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().map_err(|_| poisoned())?;
        inner.strings.remove(key);
        inner.deadlines.remove(key);
        inner.sets.remove(key);
        inner.hashes.remove(key);
        inner.sorted.remove(key);
        inner.counters.remove(key);
        Ok(())
    }

    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()> {
        let mut inner = self.inner.lock().map_err(|_| poisoned())?;
        let hash = inner.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert(field.to_string(), value.clone());
        }
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let inner = self.inner.lock().map_err(|_| poisoned())?;
        Ok(inner.hashes.get(key).and_then(|h| h.get(field).cloned()))
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let inner = self.inner.lock().map_err(|_| poisoned())?;
        Ok(inner.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        let mut inner = self.inner.lock().map_err(|_| poisoned())?;
        let hash = inner.hashes.entry(key.to_string()).or_default();
        let slot = hash.entry(field.to_string()).or_insert_with(|| "0".to_string());
        let current: i64 = slot
            .parse()
            .map_err(|_| StoreError::Corrupt(format!("non-numeric hash field {field}")))?;
        let next = current + delta;
        *slot = next.to_string();
        Ok(next)
    }

    async fn sorted_append(
        &self,
        key: &str,
        score: f64,
        member: &str,
        cap: Option<usize>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().map_err(|_| poisoned())?;
        let log = inner.sorted.entry(key.to_string()).or_default();
        log.push((score, member.to_string()));
        // Stable sort keeps insertion order for equal scores.
        log.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        if let Some(cap) = cap
            && log.len() > cap
        {
            let excess = log.len() - cap;
            log.drain(..excess);
        }
        Ok(())
    }

    async fn sorted_range(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        let inner = self.inner.lock().map_err(|_| poisoned())?;
        let Some(log) = inner.sorted.get(key) else {
            return Ok(Vec::new());
        };
        if log.is_empty() {
            return Ok(Vec::new());
        }
        let len = log.len() as isize;
        let clamp = |i: isize| -> usize {
            let i = if i < 0 { len + i } else { i };
            i.clamp(0, len) as usize
        };
        let (start, stop) = (clamp(start), clamp(stop));
        if start > stop {
            return Ok(Vec::new());
        }
        Ok(log[start..=stop.min(log.len().saturating_sub(1))]
            .iter()
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn sorted_len(&self, key: &str) -> StoreResult<usize> {
        let inner = self.inner.lock().map_err(|_| poisoned())?;
        Ok(inner.sorted.get(key).map(|l| l.len()).unwrap_or(0))
    }

    async fn counter_incr(&self, key: &str) -> StoreResult<i64> {
        let mut inner = self.inner.lock().map_err(|_| poisoned())?;
        let counter = inner.counters.entry(key.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn clear_prefix(&self, prefix: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().map_err(|_| poisoned())?;
        inner.sets.retain(|k, _| !k.starts_with(prefix));
        inner.strings.retain(|k, _| !k.starts_with(prefix));
        inner.deadlines.retain(|k, _| !k.starts_with(prefix));
        inner.hashes.retain(|k, _| !k.starts_with(prefix));
        inner.sorted.retain(|k, _| !k.starts_with(prefix));
        inner.counters.retain(|k, _| !k.starts_with(prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sorted_append_caps_oldest() {
        let store = MemoryStore::new();
        for i in 0..105 {
            store
                .sorted_append("log", i as f64, &format!("m{i}"), Some(100))
                .await
                .unwrap();
        }
        let entries = store.sorted_range("log", 0, -1).await.unwrap();
        assert_eq!(entries.len(), 100);
        assert_eq!(entries.first().unwrap(), "m5");
        assert_eq!(entries.last().unwrap(), "m104");
    }

    #[tokio::test]
    async fn equal_scores_keep_insertion_order() {
        let store = MemoryStore::new();
        for name in ["a", "b", "c"] {
            store.sorted_append("log", 7.0, name, None).await.unwrap();
        }
        assert_eq!(store.sorted_range("log", 0, -1).await.unwrap(), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn ttl_expires_and_rewrite_survives_stale_heap_entry() {
        let store = MemoryStore::new();
        store
            .set_with_ttl("k", "v1", Duration::from_millis(0))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);

        store
            .set_with_ttl("k", "v1", Duration::from_millis(0))
            .await
            .unwrap();
        store
            .set_with_ttl("k", "v2", Duration::from_secs(300))
            .await
            .unwrap();
        // The stale zero-TTL heap entry must not evict the rewrite.
        assert_eq!(store.get("k").await.unwrap(), Some("v2".to_string()));
    }

    #[tokio::test]
    async fn clear_prefix_sweeps_all_structures() {
        let store = MemoryStore::new();
        store.set_add("room:1:participants", "u1").await.unwrap();
        store.sorted_append("room:1:messages", 1.0, "m", None).await.unwrap();
        store.counter_incr("room:1:strokes:seq").await.unwrap();
        store.set_add("room:2:participants", "u2").await.unwrap();

        store.clear_prefix("room:1").await.unwrap();

        assert!(store.set_members("room:1:participants").await.unwrap().is_empty());
        assert!(store.sorted_range("room:1:messages", 0, -1).await.unwrap().is_empty());
        assert_eq!(store.set_members("room:2:participants").await.unwrap(), ["u2"]);
    }
}
