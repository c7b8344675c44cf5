//! Router role loop
//!
//! Pulls messages from the application, keeps each affinity key pinned to one
//! worker while that key has messages in flight, and otherwise hands the
//! message to whichever worker announced readiness on the router queue.

use shared::{duty_debug, duty_info, duty_warn, CoordinationStore, DutyId, RouterSignal};

use crate::core::context::FleetContext;
use crate::core::registry::DutyRegistry;
use crate::error::CoordinatorResult;
use crate::traits::MessageHooks;

/// How the router loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouterOutcome {
    pub dispatched: u64,
    /// Whether a fetched message was handed to `unrouted` on the way out
    pub dropped_in_hand: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouterState {
    Dispatching,
    AwaitingWorker,
    Stopped,
}

pub struct RouterLoop<'a, S: CoordinationStore, H: MessageHooks + ?Sized> {
    ctx: &'a FleetContext<S>,
    hooks: &'a H,
    queue: String,
    state: RouterState,
    outcome: RouterOutcome,
}

impl<'a, S: CoordinationStore, H: MessageHooks + ?Sized> RouterLoop<'a, S, H> {
    pub fn new(ctx: &'a FleetContext<S>, hooks: &'a H) -> Self {
        Self {
            ctx,
            hooks,
            queue: ctx.keys.router_queue(),
            state: RouterState::Dispatching,
            outcome: RouterOutcome::default(),
        }
    }

    /// Claim the router duty and dispatch until the sentinel shows up
    ///
    /// The caller owns `registry` and releases the duty afterwards.
    pub async fn run(mut self, registry: &mut DutyRegistry<S>) -> CoordinatorResult<RouterOutcome> {
        registry.establish(DutyId::Router).await?;
        self.ctx
            .store
            .hset(self.ctx.keys.counts(), &DutyId::Router.to_string(), "0")
            .await?;

        while self.state != RouterState::Stopped {
            if self.stop_pending().await? {
                self.state = RouterState::Stopped;
                break;
            }
            self.route_next().await?;
        }

        duty_info!(DutyId::Router, "Router stopped after {} messages", self.outcome.dispatched);
        Ok(self.outcome)
    }

    /// Sentinel at the tail of the router queue; left in place
    async fn stop_pending(&self) -> CoordinatorResult<bool> {
        let tail = self.ctx.store.peek_tail(&self.queue).await?;
        Ok(tail.as_deref() == Some(self.ctx.sentinel()))
    }

    async fn route_next(&mut self) -> CoordinatorResult<()> {
        let Some(message) = self.hooks.next_message().await? else {
            tokio::time::sleep(self.ctx.settings.poll_interval).await;
            return Ok(());
        };
        duty_debug!(DutyId::Router, "Router message: {}", message);
        let key = self.hooks.affinity_key(&message);

        let worker = match self.pinned_worker(key.as_deref()).await? {
            Some(worker) => worker,
            None => match self.await_worker().await? {
                Some(worker) => {
                    if let Some(key) = key.as_deref() {
                        self.ctx
                            .store
                            .hset(self.ctx.keys.workers(), key, &worker.to_string())
                            .await?;
                    }
                    worker
                }
                None => {
                    self.state = RouterState::Stopped;
                    self.outcome.dropped_in_hand = true;
                    self.hooks.unrouted(message).await;
                    return Ok(());
                }
            },
        };

        self.dispatch(worker, key.as_deref(), &message).await
    }

    /// Worker still holding in-flight messages for `key`
    async fn pinned_worker(&self, key: Option<&str>) -> CoordinatorResult<Option<DutyId>> {
        let Some(key) = key else {
            return Ok(None);
        };
        let keys = &self.ctx.keys;
        let depth = self
            .ctx
            .store
            .hget(keys.depths(), key)
            .await?
            .and_then(|raw| raw.parse::<i64>().ok())
            .unwrap_or(0);
        if depth <= 0 {
            return Ok(None);
        }
        Ok(self
            .ctx
            .store
            .hget(keys.workers(), key)
            .await?
            .and_then(|raw| raw.parse::<DutyId>().ok())
            .filter(DutyId::is_worker))
    }

    /// Block on the router queue until an idle worker announces; `None` on stop
    async fn await_worker(&mut self) -> CoordinatorResult<Option<DutyId>> {
        self.state = RouterState::AwaitingWorker;
        loop {
            let Some(raw) = self
                .ctx
                .store
                .brpop(&self.queue, self.ctx.settings.queue_timeout)
                .await?
            else {
                continue;
            };

            match RouterSignal::decode(&raw, self.ctx.sentinel()) {
                RouterSignal::Stop => return Ok(None),
                RouterSignal::Ready(worker) => {
                    let pending = self.ctx.queue_len(worker).await?;
                    if pending > 0 {
                        // Stale announcement; let the worker announce again once idle
                        duty_debug!(DutyId::Router, "{} is busy ({} pending), pushing back", worker, pending);
                        self.ctx.store.lpush(&self.queue, &raw).await?;
                        tokio::time::sleep(self.ctx.settings.poll_interval).await;
                        continue;
                    }
                    self.state = RouterState::Dispatching;
                    return Ok(Some(worker));
                }
                RouterSignal::Unrecognized(raw) => {
                    duty_warn!(DutyId::Router, "Discarding unrecognized router queue entry '{}'", raw);
                }
            }
        }
    }

    async fn dispatch(&mut self, worker: DutyId, key: Option<&str>, message: &str) -> CoordinatorResult<()> {
        let keys = &self.ctx.keys;
        if let Some(key) = key {
            self.ctx.store.hincrby(keys.depths(), key, 1).await?;
        }
        self.ctx.store.lpush(&keys.duty_queue(worker), message).await?;
        self.ctx
            .store
            .hincrby(keys.counts(), &DutyId::Router.to_string(), 1)
            .await?;
        self.outcome.dispatched += 1;
        Ok(())
    }
}
