//! Fleet launcher implementations

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use shared::logging::DutyTag;
use shared::{duty_debug, duty_info};

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::traits::FleetLauncher;

/// Starts detached copies of a program running the `duty` command
pub struct CommandLauncher {
    program: PathBuf,
    /// Flags placed before the `duty` command (settings, store address, logging)
    flags: Vec<String>,
}

impl CommandLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            flags: Vec::new(),
        }
    }

    /// Launcher that re-runs the current executable
    pub fn current_exe() -> CoordinatorResult<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    /// Configure forwarded flags (fluent API)
    pub fn with_flags(mut self, flags: Vec<String>) -> Self {
        self.flags = flags;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("duty")
            .args(&self.flags)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);
        cmd
    }
}

#[async_trait]
impl FleetLauncher for CommandLauncher {
    async fn launch(&self, count: usize) -> CoordinatorResult<usize> {
        for _ in 0..count {
            let child = self.command().spawn().map_err(|e| {
                CoordinatorError::launch(format!("Failed to spawn {}: {e}", self.program.display()))
            })?;
            duty_debug!(
                DutyTag(None),
                "🚀 Launched {} (PID: {})",
                self.program.display(),
                child.id().unwrap_or(0)
            );
        }
        Ok(count)
    }
}

/// Launcher for fleets whose duty processes are started elsewhere
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLauncher;

#[async_trait]
impl FleetLauncher for NoopLauncher {
    async fn launch(&self, count: usize) -> CoordinatorResult<usize> {
        duty_info!(DutyTag(None), "Launch of {} duty processes left to the operator", count);
        Ok(0)
    }
}
