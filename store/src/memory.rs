//! In-memory coordination store
//!
//! Redis-flavoured semantics: lists are deques (`lpush` at the head, pops at
//! the tail), empty lists and hashes disappear, and a blocking pop parks until
//! a push arrives or its timeout elapses.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use shared::{CoordinationStore, SharedError, SharedResult};

#[derive(Debug, Default)]
struct StoreState {
    hashes: HashMap<String, HashMap<String, String>>,
    lists: HashMap<String, VecDeque<String>>,
}

impl StoreState {
    fn pop_back(&mut self, list: &str) -> Option<String> {
        let entries = self.lists.get_mut(list)?;
        let value = entries.pop_back();
        if entries.is_empty() {
            self.lists.remove(list);
        }
        value
    }

    fn list_len(&self, list: &str) -> usize {
        self.lists.get(list).map_or(0, VecDeque::len)
    }
}

/// Shared store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    /// Woken on every push so blocked pops can retry
    pushed: Notify,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn hget(&self, hash: &str, field: &str) -> SharedResult<Option<String>> {
        let state = self.state.lock().await;
        Ok(state.hashes.get(hash).and_then(|fields| fields.get(field)).cloned())
    }

    async fn hset(&self, hash: &str, field: &str, value: &str) -> SharedResult<()> {
        let mut state = self.state.lock().await;
        state
            .hashes
            .entry(hash.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hsetnx(&self, hash: &str, field: &str, value: &str) -> SharedResult<bool> {
        let mut state = self.state.lock().await;
        let fields = state.hashes.entry(hash.to_string()).or_default();
        if fields.contains_key(field) {
            return Ok(false);
        }
        fields.insert(field.to_string(), value.to_string());
        Ok(true)
    }

    async fn hdel(&self, hash: &str, field: &str) -> SharedResult<bool> {
        let mut state = self.state.lock().await;
        let Some(fields) = state.hashes.get_mut(hash) else {
            return Ok(false);
        };
        let existed = fields.remove(field).is_some();
        if fields.is_empty() {
            state.hashes.remove(hash);
        }
        Ok(existed)
    }

    async fn hdel_if(&self, hash: &str, field: &str, expected: &str) -> SharedResult<bool> {
        let mut state = self.state.lock().await;
        let Some(fields) = state.hashes.get_mut(hash) else {
            return Ok(false);
        };
        if fields.get(field).map(String::as_str) != Some(expected) {
            return Ok(false);
        }
        fields.remove(field);
        if fields.is_empty() {
            state.hashes.remove(hash);
        }
        Ok(true)
    }

    async fn hkeys(&self, hash: &str) -> SharedResult<Vec<String>> {
        let state = self.state.lock().await;
        let mut keys: Vec<String> = state
            .hashes
            .get(hash)
            .map(|fields| fields.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    async fn hmget(&self, hash: &str, fields: &[String]) -> SharedResult<Vec<Option<String>>> {
        let state = self.state.lock().await;
        let values = state.hashes.get(hash);
        Ok(fields
            .iter()
            .map(|field| values.and_then(|v| v.get(field)).cloned())
            .collect())
    }

    async fn hincrby(&self, hash: &str, field: &str, by: i64) -> SharedResult<i64> {
        let mut state = self.state.lock().await;
        let fields = state.hashes.entry(hash.to_string()).or_default();
        let current = match fields.get(field) {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| SharedError::store(format!("{hash}[{field}] is not an integer: {raw}")))?,
            None => 0,
        };
        let next = current
            .checked_add(by)
            .ok_or_else(|| SharedError::store(format!("{hash}[{field}] increment overflows")))?;
        fields.insert(field.to_string(), next.to_string());
        Ok(next)
    }

    async fn lpush(&self, list: &str, value: &str) -> SharedResult<usize> {
        let len = {
            let mut state = self.state.lock().await;
            let entries = state.lists.entry(list.to_string()).or_default();
            entries.push_front(value.to_string());
            entries.len()
        };
        self.pushed.notify_waiters();
        Ok(len)
    }

    async fn rpush(&self, list: &str, value: &str) -> SharedResult<usize> {
        let len = {
            let mut state = self.state.lock().await;
            let entries = state.lists.entry(list.to_string()).or_default();
            entries.push_back(value.to_string());
            entries.len()
        };
        self.pushed.notify_waiters();
        Ok(len)
    }

    async fn rpop(&self, list: &str) -> SharedResult<Option<String>> {
        Ok(self.state.lock().await.pop_back(list))
    }

    async fn brpop(&self, list: &str, timeout: Duration) -> SharedResult<Option<String>> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register for wake-ups before checking so a push in between is not missed
            let notified = self.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(value) = self.state.lock().await.pop_back(list) {
                return Ok(Some(value));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn llen(&self, list: &str) -> SharedResult<usize> {
        Ok(self.state.lock().await.list_len(list))
    }

    async fn peek_tail(&self, list: &str) -> SharedResult<Option<String>> {
        let state = self.state.lock().await;
        Ok(state.lists.get(list).and_then(|entries| entries.back()).cloned())
    }

    async fn list_keys(&self, prefix: &str) -> SharedResult<Vec<String>> {
        let state = self.state.lock().await;
        let mut keys: Vec<String> = state
            .lists
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn llen_many(&self, lists: &[String]) -> SharedResult<Vec<usize>> {
        let state = self.state.lock().await;
        Ok(lists.iter().map(|list| state.list_len(list)).collect())
    }
}
