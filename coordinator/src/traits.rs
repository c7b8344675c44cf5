//! Trait definitions with mockall annotations for testing
//!
//! These are the seams where the embedding application and the host
//! environment plug into the role loops: message hooks, local process
//! probing and fleet launching.

use crate::error::CoordinatorResult;

/// Message hooks supplied by the embedding application
///
/// The router calls `next_message` and `affinity_key`; workers call
/// `affinity_key` and `process`. The loops never look inside a message.
#[async_trait::async_trait]
pub trait MessageHooks: Send + Sync {
    /// Produce the next unit of inbound work, `None` when nothing is available
    ///
    /// Called only by the router. May have side effects such as advancing a
    /// cursor; it is not required to be idempotent.
    async fn next_message(&self) -> CoordinatorResult<Option<String>>;

    /// Derive the sticky-routing key for a message; `None` disables affinity
    fn affinity_key(&self, message: &str) -> Option<String>;

    /// Perform the actual work for one message
    async fn process(&self, message: &str) -> CoordinatorResult<()>;

    /// Receive a message the router fetched but could not deliver before stopping
    ///
    /// The default implementation logs and drops it.
    async fn unrouted(&self, message: String) {
        tracing::warn!("⚠️  Dropping unrouted message on shutdown: {}", message);
    }
}

/// Local process liveness probe
#[mockall::automock]
pub trait LivenessProbe: Send + Sync {
    /// Whether a process with `pid` exists on this host
    fn process_exists(&self, pid: u32) -> CoordinatorResult<bool>;
}

/// Launches processes that will report for duty
#[mockall::automock]
#[async_trait::async_trait]
pub trait FleetLauncher: Send + Sync {
    /// Start `count` duty processes; returns how many were started
    async fn launch(&self, count: usize) -> CoordinatorResult<usize>;
}
