//! Fleet settings
//!
//! Loaded once at process start from a YAML file, then overridden from the
//! environment and the command line, and passed by reference to every role.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use shared::DutyId;

use crate::core::FleetMode;
use crate::error::{CoordinatorError, CoordinatorResult};

/// Default settings file name, looked up in the working directory
pub const DEFAULT_SETTINGS_FILE: &str = "coordinator.yml";

/// Durations are written as (fractional) seconds in the settings file
mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Prefix for every key the fleet keeps in the store
    pub namespace: String,
    /// Address of the store server
    pub store_addr: String,
    /// Reserved queue value meaning "stop this duty"
    pub stop_action: String,
    /// How long `duty` waits on the needs queue for an assignment
    #[serde(with = "seconds")]
    pub need_timeout: Duration,
    /// Blocking pop timeout on duty and router queues
    #[serde(with = "seconds")]
    pub queue_timeout: Duration,
    /// Poll interval while waiting for duties to stop
    #[serde(with = "seconds")]
    pub kill_timeout: Duration,
    /// Telemetry period and conductor queue timeout
    #[serde(with = "seconds")]
    pub stats_period: Duration,
    /// Router back-off when the message source is empty
    #[serde(with = "seconds")]
    pub poll_interval: Duration,
    pub max_workers: u8,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    /// Launch duty processes when the conductor fills the needs queue
    pub launch_duties: bool,
    /// Override for when the conductor ends its monitor loop on its own
    pub stop_when_drained: Option<bool>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            namespace: "coordinator".to_string(),
            store_addr: "127.0.0.1:6380".to_string(),
            stop_action: "stop".to_string(),
            need_timeout: Duration::from_secs(10),
            queue_timeout: Duration::from_secs(15),
            kill_timeout: Duration::from_secs(5),
            stats_period: Duration::from_secs(60),
            poll_interval: Duration::from_millis(100),
            max_workers: 1,
            log_level: "info".to_string(),
            log_file: Some(PathBuf::from("coordinator.log")),
            launch_duties: false,
            stop_when_drained: None,
        }
    }
}

impl Settings {
    /// Load settings from a YAML file; a missing file yields the defaults
    pub fn load(path: &Path) -> CoordinatorResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> CoordinatorResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings = serde_yaml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply `COORDINATOR_*` environment overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(addr) = std::env::var("COORDINATOR_STORE_ADDR") {
            self.store_addr = addr;
        }
        if let Ok(namespace) = std::env::var("COORDINATOR_NAMESPACE") {
            self.namespace = namespace;
        }
        self
    }

    pub fn validate(&self) -> CoordinatorResult<()> {
        if self.namespace.is_empty() {
            return Err(CoordinatorError::config("namespace", "must not be empty"));
        }
        if self.stop_action.is_empty() {
            return Err(CoordinatorError::config("stop_action", "must not be empty"));
        }
        if self.stop_action.parse::<DutyId>().is_ok() {
            return Err(CoordinatorError::config(
                "stop_action",
                format!("'{}' collides with a duty name", self.stop_action),
            ));
        }
        if !(1..=shared::MAX_WORKER_INDEX).contains(&self.max_workers) {
            return Err(CoordinatorError::config(
                "max_workers",
                format!("{} is outside 1..={}", self.max_workers, shared::MAX_WORKER_INDEX),
            ));
        }
        for (field, value) in [
            ("need_timeout", self.need_timeout),
            ("queue_timeout", self.queue_timeout),
            ("kill_timeout", self.kill_timeout),
            ("stats_period", self.stats_period),
        ] {
            if value.is_zero() {
                return Err(CoordinatorError::config(field, "must be greater than zero"));
            }
        }
        Ok(())
    }

    /// Whether the conductor ends its monitor loop once every queue is empty
    ///
    /// Unless overridden, flush mode stops when drained and fresh mode runs
    /// until explicitly stopped.
    pub fn stops_when_drained(&self, mode: FleetMode) -> bool {
        self.stop_when_drained.unwrap_or(mode == FleetMode::Flush)
    }
}
