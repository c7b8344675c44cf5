//! Worker role loop
//!
//! Consumes its own duty queue, announces readiness to the router when the
//! queue runs dry, and stops on the sentinel.

use shared::{duty_debug, duty_error, duty_info, duty_warn, CoordinationStore, DutyId};

use crate::core::context::FleetContext;
use crate::core::registry::DutyRegistry;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::traits::MessageHooks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    Idle,
    Announced,
    Processing,
    Stopped,
}

pub struct WorkerLoop<'a, S: CoordinationStore, H: MessageHooks + ?Sized> {
    ctx: &'a FleetContext<S>,
    hooks: &'a H,
    duty: DutyId,
    queue: String,
    state: WorkerState,
    processed: u64,
}

impl<'a, S: CoordinationStore, H: MessageHooks + ?Sized> WorkerLoop<'a, S, H> {
    pub fn new(ctx: &'a FleetContext<S>, hooks: &'a H, duty: DutyId) -> CoordinatorResult<Self> {
        if !duty.is_worker() {
            return Err(CoordinatorError::UnknownDutyRequest {
                request: duty.to_string(),
            });
        }
        Ok(Self {
            ctx,
            hooks,
            duty,
            queue: ctx.keys.duty_queue(duty),
            state: WorkerState::Idle,
            processed: 0,
        })
    }

    /// Claim the worker duty and run until the sentinel arrives
    ///
    /// Returns the number of messages handled. The caller owns `registry` and
    /// is responsible for releasing the duty afterwards.
    pub async fn run(mut self, registry: &mut DutyRegistry<S>) -> CoordinatorResult<u64> {
        registry.establish(self.duty).await?;
        self.ctx
            .store
            .hset(self.ctx.keys.counts(), &self.duty.to_string(), "0")
            .await?;

        while self.state != WorkerState::Stopped {
            self.step().await?;
        }

        duty_info!(self.duty, "Worker stopped after {} messages", self.processed);
        Ok(self.processed)
    }

    async fn step(&mut self) -> CoordinatorResult<()> {
        let store = &self.ctx.store;
        let popped = if self.state == WorkerState::Announced {
            store.brpop(&self.queue, self.ctx.settings.queue_timeout).await?
        } else {
            store.rpop(&self.queue).await?
        };

        let Some(value) = popped else {
            if self.state != WorkerState::Announced {
                self.announce().await?;
            }
            return Ok(());
        };

        if value == self.ctx.sentinel() {
            self.state = WorkerState::Stopped;
            return Ok(());
        }

        self.state = WorkerState::Processing;
        self.handle(&value).await?;
        self.state = WorkerState::Idle;
        Ok(())
    }

    async fn announce(&mut self) -> CoordinatorResult<()> {
        // Work may have landed between the empty pop and now
        let pending = self.ctx.store.llen(&self.queue).await?;
        if pending > 0 {
            duty_warn!(self.duty, "Queue filled before announcing ({} pending)", pending);
            return Ok(());
        }
        self.ctx
            .store
            .lpush(&self.ctx.keys.router_queue(), &self.duty.to_string())
            .await?;
        duty_debug!(self.duty, "Announced readiness");
        self.state = WorkerState::Announced;
        Ok(())
    }

    async fn handle(&mut self, message: &str) -> CoordinatorResult<()> {
        duty_debug!(self.duty, "Worker message: {}", message);
        let key = self.hooks.affinity_key(message);

        if let Err(e) = self.hooks.process(message).await {
            duty_error!(self.duty, "Processing failed for '{}': {}", message, e);
        }

        let keys = &self.ctx.keys;
        self.ctx
            .store
            .hincrby(keys.counts(), &self.duty.to_string(), 1)
            .await?;
        if let Some(key) = key {
            let depth = self.ctx.store.hincrby(keys.depths(), &key, -1).await?;
            if depth < 0 {
                duty_warn!(self.duty, "Depth for '{}' dropped to {}", key, depth);
            }
        }
        self.processed += 1;
        Ok(())
    }
}
