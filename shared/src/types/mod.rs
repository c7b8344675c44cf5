//! Core types used throughout the coordination system

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{SharedError, SharedResult};

/// Highest worker index a duty name can carry (two digit suffix)
pub const MAX_WORKER_INDEX: u8 = 99;

/// Named role slot that exactly one live process may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DutyId {
    /// Fleet manager (singleton)
    Conductor,
    /// Affinity-aware dispatcher (singleton)
    Router,
    /// Message processor with a 1-based index
    Worker(u8),
}

impl DutyId {
    /// Build a worker duty, rejecting indexes outside `1..=99`
    pub fn worker(index: u8) -> SharedResult<Self> {
        if (1..=MAX_WORKER_INDEX).contains(&index) {
            Ok(DutyId::Worker(index))
        } else {
            Err(SharedError::InvalidDuty {
                input: format!("worker index {index}"),
            })
        }
    }

    /// Worker duties `worker01..workerNN`
    pub fn workers(count: u8) -> impl Iterator<Item = DutyId> {
        (1..=count.min(MAX_WORKER_INDEX)).map(DutyId::Worker)
    }

    pub fn is_worker(&self) -> bool {
        matches!(self, DutyId::Worker(_))
    }

    /// Short label used by the status report
    pub fn abbreviation(&self) -> String {
        match self {
            DutyId::Conductor => "CONDUCTOR".to_string(),
            DutyId::Router => "ROUTER".to_string(),
            DutyId::Worker(index) => format!("W{index:02}"),
        }
    }
}

impl fmt::Display for DutyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DutyId::Conductor => write!(f, "conductor"),
            DutyId::Router => write!(f, "router"),
            DutyId::Worker(index) => write!(f, "worker{index:02}"),
        }
    }
}

impl FromStr for DutyId {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SharedError::InvalidDuty { input: s.to_string() };
        match s {
            "conductor" => Ok(DutyId::Conductor),
            "router" => Ok(DutyId::Router),
            _ => {
                let digits = s.strip_prefix("worker").ok_or_else(invalid)?;
                if digits.len() != 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                let index: u8 = digits.parse().map_err(|_| invalid())?;
                DutyId::worker(index).map_err(|_| invalid())
            }
        }
    }
}

/// Owner of a duty claim: the host and pid of the claiming process
///
/// Only used for liveness testing and for equality with the registry's stored
/// value, never as an identity in its own right.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessHandle {
    pub host: String,
    pub pid: u32,
}

impl ProcessHandle {
    pub fn new(host: impl Into<String>, pid: u32) -> Self {
        Self { host: host.into(), pid }
    }
}

impl fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.host, self.pid)
    }
}

impl FromStr for ProcessHandle {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SharedError::InvalidProcessHandle { input: s.to_string() };
        let (host, pid) = s.rsplit_once(',').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        let pid = pid.trim().parse().map_err(|_| invalid())?;
        Ok(ProcessHandle::new(host, pid))
    }
}

/// Entry on the router queue
///
/// The router queue carries both worker readiness announcements and the
/// shutdown sentinel; both travel as plain strings in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterSignal {
    /// A worker announced that its duty queue is empty
    Ready(DutyId),
    /// The shutdown sentinel
    Stop,
    /// Anything else; logged and discarded by the router
    Unrecognized(String),
}

impl RouterSignal {
    pub fn decode(raw: &str, sentinel: &str) -> Self {
        if raw == sentinel {
            return RouterSignal::Stop;
        }
        match raw.parse::<DutyId>() {
            Ok(duty) if duty.is_worker() => RouterSignal::Ready(duty),
            _ => RouterSignal::Unrecognized(raw.to_string()),
        }
    }

    pub fn encode(&self, sentinel: &str) -> String {
        match self {
            RouterSignal::Ready(duty) => duty.to_string(),
            RouterSignal::Stop => sentinel.to_string(),
            RouterSignal::Unrecognized(raw) => raw.clone(),
        }
    }
}
