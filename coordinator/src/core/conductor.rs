//! Conductor role loop
//!
//! Sizes the fleet, hands out duties through the needs queue, reports
//! telemetry while the fleet runs and drives the shutdown sequence.

use std::collections::BTreeSet;

use shared::{duty_info, duty_warn, CoordinationStore, DutyId};

use crate::core::context::FleetContext;
use crate::core::registry::DutyRegistry;
use crate::core::shutdown::ShutdownCoordinator;
use crate::core::telemetry::TelemetryReporter;
use crate::core::FleetMode;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::traits::FleetLauncher;

pub struct Conductor<'a, S: CoordinationStore> {
    ctx: &'a FleetContext<S>,
    launcher: &'a dyn FleetLauncher,
    mode: FleetMode,
}

impl<'a, S: CoordinationStore> Conductor<'a, S> {
    pub fn new(ctx: &'a FleetContext<S>, launcher: &'a dyn FleetLauncher, mode: FleetMode) -> Self {
        Self { ctx, launcher, mode }
    }

    /// Become the conductor and run the fleet until stopped
    ///
    /// Returns the duties that were handed out. The caller owns `registry` and
    /// releases the conductor duty afterwards.
    pub async fn run(&self, registry: &mut DutyRegistry<S>) -> CoordinatorResult<Vec<DutyId>> {
        registry.establish(DutyId::Conductor).await?;
        self.recover(registry).await?;

        let duties = self.prepare().await?;
        if duties.is_empty() {
            duty_warn!(DutyId::Conductor, "No duties found");
            return Ok(duties);
        }

        let assignments: Vec<String> = duties.iter().map(ToString::to_string).collect();
        self.ctx.fill_list(self.ctx.keys.needs(), &assignments).await?;
        duty_info!(DutyId::Conductor, "Queued duties: {}", assignments.join(" "));

        if self.ctx.settings.launch_duties {
            let launched = self.launcher.launch(duties.len()).await?;
            duty_info!(DutyId::Conductor, "Launched {} duty processes", launched);
        }

        let mut telemetry = TelemetryReporter::start(self.ctx, duties.clone()).await?;
        self.monitor(&mut telemetry).await?;

        duty_info!(DutyId::Conductor, "Stopping...");
        ShutdownCoordinator::new(self.ctx, registry).stop_fleet().await?;
        telemetry.finish(self.ctx).await?;
        Ok(duties)
    }

    /// Stop a half-alive fleet and check nothing but this conductor is left
    async fn recover(&self, registry: &DutyRegistry<S>) -> CoordinatorResult<()> {
        if !registry.is_duty_alive(DutyId::Router).await? {
            ShutdownCoordinator::new(self.ctx, registry).kill_duties().await?;
        }

        let live = registry.live_duties().await?;
        let expected: BTreeSet<DutyId> = [DutyId::Conductor].into_iter().collect();
        if live != expected {
            let names: Vec<String> = live.iter().map(ToString::to_string).collect();
            return Err(CoordinatorError::invariant(format!(
                "expected only the conductor to be live, found: {}",
                names.join(" ")
            )));
        }
        Ok(())
    }

    /// Reset state for the chosen mode and compute the duties to hand out
    async fn prepare(&self) -> CoordinatorResult<Vec<DutyId>> {
        let keys = &self.ctx.keys;
        let duties = match self.mode {
            FleetMode::Fresh => {
                for hash in [keys.depths(), keys.workers(), keys.counts()] {
                    self.ctx.flush_hash(hash).await?;
                }
                std::iter::once(DutyId::Router)
                    .chain(DutyId::workers(self.ctx.settings.max_workers))
                    .collect()
            }
            FleetMode::Flush => self
                .ctx
                .store
                .list_keys(&keys.worker_queue_prefix())
                .await?
                .iter()
                .filter_map(|queue| keys.duty_of_queue(queue))
                .filter(DutyId::is_worker)
                .collect(),
        };

        self.ctx.flush_list(keys.needs()).await?;
        self.ctx.flush_list(&keys.router_queue()).await?;
        Ok(duties)
    }

    async fn monitor(&self, telemetry: &mut TelemetryReporter) -> CoordinatorResult<()> {
        let queue = self.ctx.keys.conductor_queue();
        let stop_when_drained = self.ctx.settings.stops_when_drained(self.mode);

        loop {
            let popped = self
                .ctx
                .store
                .brpop(&queue, self.ctx.settings.stats_period)
                .await?;
            match popped.as_deref() {
                Some(value) if value == self.ctx.sentinel() => break,
                Some(value) => duty_info!(DutyId::Conductor, "Ignoring action '{}'", value),
                None => {}
            }

            if let Some(sample) = telemetry.tick(self.ctx).await? {
                if stop_when_drained && sample.is_drained() {
                    duty_info!(DutyId::Conductor, "All duty queues drained");
                    break;
                }
            }
        }
        Ok(())
    }
}
