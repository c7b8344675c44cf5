//! Coordination store contract
//!
//! Every role process talks to the fleet exclusively through these primitives.
//! Implementations must make each call atomic: hash set-if-absent, list pops,
//! counter increments and the multi-list length read in particular.

use std::time::Duration;

use crate::errors::SharedResult;

/// Minimum primitive set the coordinator needs from a shared store
///
/// Lists behave as deques: `lpush` adds at the head, `rpush` adds at the tail,
/// and every pop or peek works at the tail, so `lpush` + `rpop` is FIFO.
/// Lists and hashes that become empty cease to exist.
#[mockall::automock]
#[async_trait::async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Read one hash field
    async fn hget(&self, hash: &str, field: &str) -> SharedResult<Option<String>>;

    /// Write one hash field, replacing any previous value
    async fn hset(&self, hash: &str, field: &str, value: &str) -> SharedResult<()>;

    /// Write one hash field only if it is absent; returns whether it was written
    async fn hsetnx(&self, hash: &str, field: &str, value: &str) -> SharedResult<bool>;

    /// Remove one hash field; returns whether it existed
    async fn hdel(&self, hash: &str, field: &str) -> SharedResult<bool>;

    /// Remove one hash field only while it still holds `expected`
    async fn hdel_if(&self, hash: &str, field: &str, expected: &str) -> SharedResult<bool>;

    /// All field names of a hash
    async fn hkeys(&self, hash: &str) -> SharedResult<Vec<String>>;

    /// Read several fields at once, in the order given
    async fn hmget(&self, hash: &str, fields: &[String]) -> SharedResult<Vec<Option<String>>>;

    /// Atomically add `by` to an integer field (missing counts as 0)
    async fn hincrby(&self, hash: &str, field: &str, by: i64) -> SharedResult<i64>;

    /// Push at the head of a list; returns the new length
    async fn lpush(&self, list: &str, value: &str) -> SharedResult<usize>;

    /// Push at the tail of a list, ahead of everything already queued
    async fn rpush(&self, list: &str, value: &str) -> SharedResult<usize>;

    /// Pop from the tail without waiting
    async fn rpop(&self, list: &str) -> SharedResult<Option<String>>;

    /// Pop from the tail, waiting up to `timeout` for a value to arrive
    async fn brpop(&self, list: &str, timeout: Duration) -> SharedResult<Option<String>>;

    /// Current list length (0 for a missing list)
    async fn llen(&self, list: &str) -> SharedResult<usize>;

    /// The value the next pop would return, without removing it
    async fn peek_tail(&self, list: &str) -> SharedResult<Option<String>>;

    /// Names of existing lists starting with `prefix`, sorted
    async fn list_keys(&self, prefix: &str) -> SharedResult<Vec<String>>;

    /// Lengths of several lists read in one atomic step
    async fn llen_many(&self, lists: &[String]) -> SharedResult<Vec<usize>>;
}
