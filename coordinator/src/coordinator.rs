//! Command dispatch
//!
//! One `Coordinator` per process. It runs a single command, and whatever the
//! outcome, gives back any duty the process claimed along the way.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use shared::logging::{log_and_echo, log_error, DutyTag};
use shared::{duty_info, duty_warn, CoordinationStore, DutyId, ProcessHandle};

use crate::core::{
    Conductor, DutyRegistry, FleetContext, FleetMode, RouterLoop, ShutdownCoordinator, StatusReport, WorkerLoop,
};
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::traits::{FleetLauncher, LivenessProbe, MessageHooks};

pub const HELP_TEXT: &str = "\
Commands:
  check          print the state of every duty and the needs queue
  start          become the conductor and start a fresh fleet
  stop           stop the running fleet
  spawn [count]  launch duty processes (default: one per queued need)
  flush          become the conductor and drain the queues left behind
  duty           wait for an assignment and run it as router or worker
  help           print this text";

/// Closed set of operator commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Check,
    Start,
    Stop,
    Spawn,
    Flush,
    Duty,
    Help,
}

impl Command {
    /// Case-insensitive lookup; anything unknown asks for help
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "check" => Command::Check,
            "start" => Command::Start,
            "stop" => Command::Stop,
            "spawn" => Command::Spawn,
            "flush" => Command::Flush,
            "duty" => Command::Duty,
            _ => Command::Help,
        }
    }

    /// Commands that may turn this process into the conductor
    pub fn runs_conductor(&self) -> bool {
        matches!(self, Command::Start | Command::Flush)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Check => "check",
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Spawn => "spawn",
            Command::Flush => "flush",
            Command::Duty => "duty",
            Command::Help => "help",
        };
        write!(f, "{name}")
    }
}

pub struct Coordinator<S: CoordinationStore, H: MessageHooks + ?Sized> {
    ctx: FleetContext<S>,
    hooks: Arc<H>,
    registry: DutyRegistry<S>,
    launcher: Arc<dyn FleetLauncher>,
}

impl<S: CoordinationStore, H: MessageHooks + ?Sized> Coordinator<S, H> {
    pub fn new(
        ctx: FleetContext<S>,
        hooks: Arc<H>,
        probe: Arc<dyn LivenessProbe>,
        launcher: Arc<dyn FleetLauncher>,
        local: ProcessHandle,
    ) -> Self {
        let registry = DutyRegistry::new(ctx.store.clone(), ctx.keys.clone(), probe, local);
        Self {
            ctx,
            hooks,
            registry,
            launcher,
        }
    }

    pub fn context(&self) -> &FleetContext<S> {
        &self.ctx
    }

    pub fn registry(&self) -> &DutyRegistry<S> {
        &self.registry
    }

    /// Run one command, then release any held duty
    ///
    /// Failures are logged with their cause chain before the release; the
    /// command's own result is returned even when the release fails too.
    pub async fn run(&mut self, command: Command, args: &[String]) -> CoordinatorResult<()> {
        let result = self.dispatch(command, args).await;
        if let Err(e) = &result {
            log_error(self.registry.tag(), &format!("Command '{command}'"), e);
        }

        if let Err(e) = self.release_held().await {
            if result.is_ok() {
                return Err(e);
            }
        }
        result
    }

    /// Run one command unless `interrupt` resolves first
    ///
    /// On interruption the command future is dropped, the held duty is
    /// released and `Interrupted` names the signal.
    pub async fn run_until<F>(&mut self, command: Command, args: &[String], interrupt: F) -> CoordinatorResult<()>
    where
        F: Future<Output = String>,
    {
        let signal = tokio::select! {
            result = self.run(command, args) => return result,
            signal = interrupt => signal,
        };

        duty_warn!(self.registry.tag(), "🛑 Interrupted by {}, releasing duty", signal);
        self.release_held().await?;
        Err(CoordinatorError::Interrupted { signal })
    }

    /// Give back the duty this process holds, if any
    pub async fn release_held(&mut self) -> CoordinatorResult<()> {
        let tag = self.registry.tag();
        let result = self.registry.release().await;
        if let Err(e) = &result {
            log_error(tag, "Release", e);
        }
        result
    }

    async fn dispatch(&mut self, command: Command, args: &[String]) -> CoordinatorResult<()> {
        match command {
            Command::Check => self.check().await,
            Command::Start => self.start(FleetMode::Fresh).await,
            Command::Flush => self.start(FleetMode::Flush).await,
            Command::Stop => self.stop().await,
            Command::Spawn => self.spawn(args.first().map(String::as_str)).await,
            Command::Duty => self.duty().await,
            Command::Help => {
                println!("{HELP_TEXT}");
                Ok(())
            }
        }
    }

    pub async fn check(&self) -> CoordinatorResult<()> {
        let report = StatusReport::collect(&self.ctx).await?;
        log_and_echo(self.registry.tag(), &format!("CHECK - {report}"));
        Ok(())
    }

    async fn start(&mut self, mode: FleetMode) -> CoordinatorResult<()> {
        if self.registry.is_duty_alive(DutyId::Conductor).await? {
            let message = match mode {
                FleetMode::Fresh => "Already started",
                FleetMode::Flush => "Still running!",
            };
            log_and_echo(self.registry.tag(), message);
            return Ok(());
        }
        Conductor::new(&self.ctx, self.launcher.as_ref(), mode)
            .run(&mut self.registry)
            .await?;
        Ok(())
    }

    async fn stop(&self) -> CoordinatorResult<()> {
        let tag = self.registry.tag();
        if self.registry.is_duty_alive(DutyId::Conductor).await? {
            self.ctx
                .store
                .lpush(&self.ctx.keys.conductor_queue(), self.ctx.sentinel())
                .await?;
            log_and_echo(tag, "Sending stop to conductor");
            return Ok(());
        }

        if self.registry.live_duties().await?.is_empty() {
            log_and_echo(tag, "Not running");
            return Ok(());
        }

        log_and_echo(tag, "Stopping without conductor!");
        ShutdownCoordinator::new(&self.ctx, &self.registry).stop_fleet().await?;
        log_and_echo(tag, "Stopped");
        Ok(())
    }

    async fn spawn(&self, count: Option<&str>) -> CoordinatorResult<()> {
        let count = match count {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| CoordinatorError::config("spawn count", format!("'{raw}' is not a number")))?,
            None => self.ctx.store.llen(self.ctx.keys.needs()).await?,
        };
        if count == 0 {
            log_and_echo(self.registry.tag(), "Nothing to spawn");
            return Ok(());
        }
        let launched = self.launcher.launch(count).await?;
        log_and_echo(self.registry.tag(), &format!("Spawned {launched} duty processes"));
        Ok(())
    }

    async fn duty(&mut self) -> CoordinatorResult<()> {
        let Some(request) = self
            .ctx
            .store
            .brpop(self.ctx.keys.needs(), self.ctx.settings.need_timeout)
            .await?
        else {
            duty_warn!(DutyTag(None), "Process duty not found");
            return Ok(());
        };

        match request.parse::<DutyId>() {
            Ok(DutyId::Router) => {
                let outcome = RouterLoop::new(&self.ctx, self.hooks.as_ref())
                    .run(&mut self.registry)
                    .await?;
                duty_info!(DutyId::Router, "Dispatched {} messages", outcome.dispatched);
                Ok(())
            }
            Ok(duty @ DutyId::Worker(_)) => {
                WorkerLoop::new(&self.ctx, self.hooks.as_ref(), duty)?
                    .run(&mut self.registry)
                    .await?;
                Ok(())
            }
            _ => Err(CoordinatorError::UnknownDutyRequest { request }),
        }
    }
}
