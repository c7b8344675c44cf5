//! Store key layout and the context every role loop runs with

use std::sync::Arc;

use shared::{CoordinationStore, DutyId};

use crate::config::Settings;
use crate::error::CoordinatorResult;

/// Names of every hash and list the fleet keeps under one namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKeys {
    namespace: String,
    processes: String,
    depths: String,
    workers: String,
    counts: String,
    needs: String,
}

impl StoreKeys {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            processes: format!("{namespace}:processes"),
            depths: format!("{namespace}:depths"),
            workers: format!("{namespace}:workers"),
            counts: format!("{namespace}:counts"),
            needs: format!("{namespace}:needs"),
        }
    }

    /// Duty → owning process ("host,pid")
    pub fn processes(&self) -> &str {
        &self.processes
    }

    /// Affinity key → in-flight message count
    pub fn depths(&self) -> &str {
        &self.depths
    }

    /// Affinity key → worker currently pinned to it
    pub fn workers(&self) -> &str {
        &self.workers
    }

    /// Duty → messages handled since it was established
    pub fn counts(&self) -> &str {
        &self.counts
    }

    /// Duties waiting for a process to claim them
    pub fn needs(&self) -> &str {
        &self.needs
    }

    pub fn duty_queue(&self, duty: DutyId) -> String {
        format!("{}{duty}", self.duty_queue_prefix())
    }

    pub fn router_queue(&self) -> String {
        self.duty_queue(DutyId::Router)
    }

    pub fn conductor_queue(&self) -> String {
        self.duty_queue(DutyId::Conductor)
    }

    pub fn duty_queue_prefix(&self) -> String {
        format!("{}:duty_", self.namespace)
    }

    pub fn worker_queue_prefix(&self) -> String {
        format!("{}worker", self.duty_queue_prefix())
    }

    /// Recover the duty a queue name belongs to
    pub fn duty_of_queue(&self, queue: &str) -> Option<DutyId> {
        queue
            .strip_prefix(&self.duty_queue_prefix())
            .and_then(|name| name.parse().ok())
    }

    /// Application-owned key under the same namespace
    pub fn custom(&self, name: &str) -> String {
        format!("{}:{name}", self.namespace)
    }
}

/// Store handle, key layout and settings shared by a role loop
pub struct FleetContext<S: CoordinationStore> {
    pub store: Arc<S>,
    pub keys: StoreKeys,
    pub settings: Arc<Settings>,
}

impl<S: CoordinationStore> Clone for FleetContext<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            keys: self.keys.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<S: CoordinationStore> FleetContext<S> {
    pub fn new(store: Arc<S>, settings: Arc<Settings>) -> Self {
        let keys = StoreKeys::new(&settings.namespace);
        Self { store, keys, settings }
    }

    /// The reserved "stop this duty" value
    pub fn sentinel(&self) -> &str {
        &self.settings.stop_action
    }

    pub async fn queue_len(&self, duty: DutyId) -> CoordinatorResult<usize> {
        Ok(self.store.llen(&self.keys.duty_queue(duty)).await?)
    }

    /// Empty a list from the consuming end; returns how many entries were dropped
    pub async fn flush_list(&self, list: &str) -> CoordinatorResult<usize> {
        let mut dropped = 0;
        while self.store.rpop(list).await?.is_some() {
            dropped += 1;
        }
        Ok(dropped)
    }

    /// Remove every field of a hash
    pub async fn flush_hash(&self, hash: &str) -> CoordinatorResult<()> {
        for field in self.store.hkeys(hash).await? {
            self.store.hdel(hash, &field).await?;
        }
        Ok(())
    }

    /// Queue values in order, so they are consumed in the order given
    pub async fn fill_list(&self, list: &str, values: &[String]) -> CoordinatorResult<()> {
        for value in values {
            self.store.lpush(list, value).await?;
        }
        Ok(())
    }
}
