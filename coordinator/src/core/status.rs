//! Fleet status report printed by `check`

use std::collections::BTreeSet;
use std::fmt;

use shared::{CoordinationStore, DutyId};

use crate::core::context::FleetContext;
use crate::error::CoordinatorResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DutyStatus {
    pub duty: DutyId,
    /// The process hash names an owner
    pub claimed: bool,
    pub queue_len: usize,
}

impl fmt::Display for DutyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = if self.claimed { "T" } else { "F" };
        write!(f, "{}:{},{}", self.duty.abbreviation(), flag, self.queue_len)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub duties: Vec<DutyStatus>,
    pub needs_len: usize,
}

impl StatusReport {
    /// Conductor, router, every registered duty and every duty with a queue
    pub async fn collect<S: CoordinationStore>(ctx: &FleetContext<S>) -> CoordinatorResult<Self> {
        let keys = &ctx.keys;
        let mut known: BTreeSet<DutyId> = [DutyId::Conductor, DutyId::Router].into_iter().collect();

        known.extend(
            ctx.store
                .hkeys(keys.processes())
                .await?
                .iter()
                .filter_map(|field| field.parse::<DutyId>().ok()),
        );
        known.extend(
            ctx.store
                .list_keys(&keys.duty_queue_prefix())
                .await?
                .iter()
                .filter_map(|queue| keys.duty_of_queue(queue)),
        );

        let mut duties = Vec::with_capacity(known.len());
        for duty in known {
            let claimed = ctx.store.hget(keys.processes(), &duty.to_string()).await?.is_some();
            let queue_len = ctx.queue_len(duty).await?;
            duties.push(DutyStatus {
                duty,
                claimed,
                queue_len,
            });
        }
        let needs_len = ctx.store.llen(keys.needs()).await?;

        Ok(Self { duties, needs_len })
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for status in &self.duties {
            write!(f, "{status} ")?;
        }
        write!(f, "N:{}", self.needs_len)
    }
}
