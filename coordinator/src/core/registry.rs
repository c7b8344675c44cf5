//! Duty registry
//!
//! Claims, verifies liveness of, and releases duty slots. The process hash
//! maps each duty to the `host,pid` of its owner; a slot is only ever taken
//! with set-if-absent and only ever cleared with compare-and-delete, so two
//! processes racing for an orphaned slot cannot both win.

use std::collections::BTreeSet;
use std::sync::Arc;

use shared::logging::DutyTag;
use shared::{duty_debug, duty_info, duty_warn, CoordinationStore, DutyId, ProcessHandle};

use crate::core::context::StoreKeys;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::traits::LivenessProbe;

pub struct DutyRegistry<S: CoordinationStore> {
    store: Arc<S>,
    keys: StoreKeys,
    probe: Arc<dyn LivenessProbe>,
    /// This process, as recorded when it claims a duty
    local: ProcessHandle,
    /// Duty this process currently holds
    held: Option<DutyId>,
}

impl<S: CoordinationStore> DutyRegistry<S> {
    pub fn new(store: Arc<S>, keys: StoreKeys, probe: Arc<dyn LivenessProbe>, local: ProcessHandle) -> Self {
        Self {
            store,
            keys,
            probe,
            local,
            held: None,
        }
    }

    pub fn local_handle(&self) -> &ProcessHandle {
        &self.local
    }

    pub fn held(&self) -> Option<DutyId> {
        self.held
    }

    /// Log label for this process
    pub fn tag(&self) -> DutyTag {
        DutyTag(self.held)
    }

    /// Whether a recorded owner is still running
    ///
    /// Owners on other hosts are assumed alive. Probe failures count as dead so
    /// a slot is reclaimed rather than blocked forever.
    pub fn is_alive(&self, handle: &ProcessHandle) -> bool {
        if handle.host != self.local.host {
            return true;
        }
        match self.probe.process_exists(handle.pid) {
            Ok(alive) => alive,
            Err(e) => {
                duty_debug!(self.tag(), "Probe for pid {} failed: {}", handle.pid, e);
                false
            }
        }
    }

    fn is_record_alive(&self, record: &str) -> bool {
        match record.parse::<ProcessHandle>() {
            Ok(handle) => self.is_alive(&handle),
            Err(_) => {
                duty_warn!(self.tag(), "Unreadable process record '{}'", record);
                false
            }
        }
    }

    /// Raw owner record for a duty
    pub async fn owner_record(&self, duty: DutyId) -> CoordinatorResult<Option<String>> {
        Ok(self.store.hget(self.keys.processes(), &duty.to_string()).await?)
    }

    /// Whether some live process currently holds `duty`
    pub async fn is_duty_alive(&self, duty: DutyId) -> CoordinatorResult<bool> {
        Ok(self
            .owner_record(duty)
            .await?
            .is_some_and(|record| self.is_record_alive(&record)))
    }

    /// Claim `duty` for this process
    ///
    /// Fails with `DutyConflict` when a live process owns the slot, or when
    /// another claimant wins the set-if-absent race. A dead owner's record is
    /// cleared first, but only while it still names that dead owner.
    pub async fn establish(&mut self, duty: DutyId) -> CoordinatorResult<ProcessHandle> {
        let field = duty.to_string();

        if let Some(record) = self.owner_record(duty).await? {
            if self.is_record_alive(&record) {
                return Err(CoordinatorError::DutyConflict { duty, owner: record });
            }
            if self.store.hdel_if(self.keys.processes(), &field, &record).await? {
                duty_info!(self.tag(), "Reclaimed {} from dead owner {}", duty, record);
            }
        }

        let claimed = self
            .store
            .hsetnx(self.keys.processes(), &field, &self.local.to_string())
            .await?;
        if !claimed {
            let owner = self.owner_record(duty).await?.unwrap_or_default();
            return Err(CoordinatorError::DutyConflict { duty, owner });
        }

        self.held = Some(duty);
        duty_warn!(self.tag(), "Duty established");
        Ok(self.local.clone())
    }

    /// Give up the held duty, if any
    ///
    /// Fails with `InvariantViolation` when the registry no longer names this
    /// process as the owner; the slot is then left to whoever holds it.
    pub async fn release(&mut self) -> CoordinatorResult<()> {
        let Some(duty) = self.held.take() else {
            return Ok(());
        };
        let field = duty.to_string();
        let own = self.local.to_string();

        let current = self.store.hget(self.keys.processes(), &field).await?;
        if current.as_deref() != Some(own.as_str()) {
            return Err(CoordinatorError::invariant(format!(
                "duty {duty} is not self: registry names {}",
                current.as_deref().unwrap_or("nobody")
            )));
        }

        self.store.hdel_if(self.keys.processes(), &field, &own).await?;
        duty_warn!(DutyTag::from(duty), "Duty terminated");
        Ok(())
    }

    /// Every duty with a live owner; dead owners are deregistered on the way
    pub async fn live_duties(&self) -> CoordinatorResult<BTreeSet<DutyId>> {
        let mut live = BTreeSet::new();
        for field in self.store.hkeys(self.keys.processes()).await? {
            let Ok(duty) = field.parse::<DutyId>() else {
                duty_debug!(self.tag(), "Ignoring foreign process entry '{}'", field);
                continue;
            };
            let Some(record) = self.store.hget(self.keys.processes(), &field).await? else {
                continue;
            };
            if self.is_record_alive(&record) {
                live.insert(duty);
            } else if self.store.hdel_if(self.keys.processes(), &field, &record).await? {
                duty_info!(self.tag(), "Deregistered {} (owner {} is gone)", duty, record);
            }
        }
        Ok(live)
    }

    /// Live duties other than the conductor
    pub async fn live_fleet_duties(&self) -> CoordinatorResult<BTreeSet<DutyId>> {
        let mut live = self.live_duties().await?;
        live.remove(&DutyId::Conductor);
        Ok(live)
    }
}
