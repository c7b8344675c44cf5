//! Fleet shutdown
//!
//! Delivers the sentinel to every live duty except the conductor and waits
//! for the registry to empty out.

use std::collections::BTreeSet;

use shared::logging::DutyTag;
use shared::{duty_info, CoordinationStore, DutyId};

use crate::core::context::FleetContext;
use crate::core::registry::DutyRegistry;
use crate::error::CoordinatorResult;

pub struct ShutdownCoordinator<'a, S: CoordinationStore> {
    ctx: &'a FleetContext<S>,
    registry: &'a DutyRegistry<S>,
}

impl<'a, S: CoordinationStore> ShutdownCoordinator<'a, S> {
    pub fn new(ctx: &'a FleetContext<S>, registry: &'a DutyRegistry<S>) -> Self {
        Self { ctx, registry }
    }

    fn tag(&self) -> DutyTag {
        self.registry.tag()
    }

    /// Full shutdown: drop pending assignments, then stop every live duty
    pub async fn stop_fleet(&self) -> CoordinatorResult<()> {
        self.clear_assignments().await?;
        self.kill_duties().await
    }

    /// Empty the needs queue and the router queue
    pub async fn clear_assignments(&self) -> CoordinatorResult<()> {
        let keys = &self.ctx.keys;
        let needs = self.ctx.flush_list(keys.needs()).await?;
        let router = self.ctx.flush_list(&keys.router_queue()).await?;
        if needs + router > 0 {
            duty_info!(self.tag(), "Cleared {} needs and {} router entries", needs, router);
        }
        Ok(())
    }

    /// Send the sentinel to every live duty but the conductor and wait for them
    ///
    /// The sentinel goes to the consuming end of each queue so it is seen
    /// before any pending messages, which stay queued for a later flush.
    pub async fn kill_duties(&self) -> CoordinatorResult<()> {
        let live = self.registry.live_fleet_duties().await?;
        for duty in &live {
            self.ctx
                .store
                .rpush(&self.ctx.keys.duty_queue(*duty), self.ctx.sentinel())
                .await?;
            duty_info!(self.tag(), "Sent stop to {}", duty);
        }
        self.wait_for_stop(live).await
    }

    async fn wait_for_stop(&self, mut remaining: BTreeSet<DutyId>) -> CoordinatorResult<()> {
        while !remaining.is_empty() {
            let names: Vec<String> = remaining.iter().map(ToString::to_string).collect();
            duty_info!(self.tag(), "Waiting for duties to stop: {}", names.join(" "));
            tokio::time::sleep(self.ctx.settings.kill_timeout).await;
            remaining = self.registry.live_fleet_duties().await?;
        }
        Ok(())
    }
}
