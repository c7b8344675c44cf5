//! Throughput and backlog telemetry for the conductor's monitor loop

use std::time::Duration;
use tokio::time::Instant;

use shared::logging::{log_and_echo, DutyTag};
use shared::{CoordinationStore, DutyId};

use crate::core::context::FleetContext;
use crate::error::CoordinatorResult;

/// One telemetry tick, ordered like the duty set the reporter was built with
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySample {
    /// Messages per second since the previous sample; `None` without two counts
    pub rates: Vec<Option<f64>>,
    pub backlog: Vec<usize>,
}

impl TelemetrySample {
    pub fn stats_line(&self) -> String {
        let rates: Vec<String> = self
            .rates
            .iter()
            .map(|rate| rate.map_or_else(|| "-".to_string(), |r| format!("{r:.1}")))
            .collect();
        format!("STATS:   {}", rates.join("\t"))
    }

    pub fn backlog_line(&self) -> String {
        let depths: Vec<String> = self.backlog.iter().map(ToString::to_string).collect();
        format!("BACKLOG: {}", depths.join("\t"))
    }

    /// Every managed queue is empty
    pub fn is_drained(&self) -> bool {
        self.backlog.iter().all(|&len| len == 0)
    }
}

pub struct TelemetryReporter {
    duties: Vec<DutyId>,
    queues: Vec<String>,
    period: Duration,
    last_tick: Instant,
    last_counts: Vec<Option<i64>>,
}

impl TelemetryReporter {
    /// Take the baseline every later rate is measured against
    pub async fn start<S: CoordinationStore>(ctx: &FleetContext<S>, duties: Vec<DutyId>) -> CoordinatorResult<Self> {
        let queues = duties.iter().map(|duty| ctx.keys.duty_queue(*duty)).collect();
        let last_counts = read_counts(ctx, &duties).await?;
        Ok(Self {
            duties,
            queues,
            period: ctx.settings.stats_period,
            last_tick: Instant::now(),
            last_counts,
        })
    }

    pub fn duties(&self) -> &[DutyId] {
        &self.duties
    }

    /// Sample counters and backlog if at least one period has passed
    pub async fn tick<S: CoordinationStore>(&mut self, ctx: &FleetContext<S>) -> CoordinatorResult<Option<TelemetrySample>> {
        let now = Instant::now();
        if now.duration_since(self.last_tick) < self.period {
            return Ok(None);
        }
        Ok(Some(self.report(ctx, now).await?))
    }

    /// Closing sample once the fleet has stopped, whatever the period
    pub async fn finish<S: CoordinationStore>(&mut self, ctx: &FleetContext<S>) -> CoordinatorResult<TelemetrySample> {
        self.report(ctx, Instant::now()).await
    }

    async fn report<S: CoordinationStore>(&mut self, ctx: &FleetContext<S>, now: Instant) -> CoordinatorResult<TelemetrySample> {
        let sample = self.sample(ctx, now).await?;
        log_and_echo(DutyTag::from(DutyId::Conductor), &sample.stats_line());
        log_and_echo(DutyTag::from(DutyId::Conductor), &sample.backlog_line());
        Ok(sample)
    }

    async fn sample<S: CoordinationStore>(&mut self, ctx: &FleetContext<S>, now: Instant) -> CoordinatorResult<TelemetrySample> {
        let counts = read_counts(ctx, &self.duties).await?;
        let secs = now.duration_since(self.last_tick).as_secs_f64();
        let rates = counts
            .iter()
            .zip(&self.last_counts)
            .map(|(current, previous)| match (current, previous) {
                (Some(current), Some(previous)) if secs > 0.0 => Some((current - previous) as f64 / secs),
                _ => None,
            })
            .collect();

        let backlog = ctx.store.llen_many(&self.queues).await?;

        self.last_tick = now;
        self.last_counts = counts;
        Ok(TelemetrySample { rates, backlog })
    }
}

async fn read_counts<S: CoordinationStore>(ctx: &FleetContext<S>, duties: &[DutyId]) -> CoordinatorResult<Vec<Option<i64>>> {
    let fields: Vec<String> = duties.iter().map(ToString::to_string).collect();
    Ok(ctx
        .store
        .hmget(ctx.keys.counts(), &fields)
        .await?
        .into_iter()
        .map(|raw| raw.and_then(|value| value.parse().ok()))
        .collect())
}
