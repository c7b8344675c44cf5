//! Line-file tester
//!
//! Runs any coordinator command with `LineFileHooks`. When this process runs
//! the conductor it clears the routed/worked tallies first and prints the
//! reconciliation once the fleet has stopped. Ctrl-C and SIGTERM release the
//! held duty before exiting.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use coordinator::services::{local_handle, CommandLauncher, RealLivenessProbe, RemoteStore};
use coordinator::{Cli, Coordinator, FleetContext};
use shared::logging::{self, DutyTag};
use shared::{duty_info, DutyId};
use tester::{LineFileHooks, Reconciliation, TesterSettings};

#[derive(Parser)]
#[command(name = "tester")]
struct Args {
    #[command(flatten)]
    cli: Cli,

    /// Message file, overrides the settings file
    #[arg(long)]
    input_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let settings = args.cli.load_settings()?;
    let mut tester_settings = TesterSettings::load(&args.cli.settings)?;
    if let Some(file) = args.input_file {
        tester_settings.input_file = file;
    }
    logging::init_tracing(Some(&settings.log_level), settings.log_file.as_deref())?;

    let store = Arc::new(RemoteStore::connect(&settings.store_addr).await?);
    let ctx = FleetContext::new(store.clone(), Arc::new(settings));
    let input_file = tester_settings.input_file.display().to_string();
    let hooks = Arc::new(LineFileHooks::new(store.clone(), &ctx.keys, tester_settings.input_file));
    let routed = hooks.routed_key().to_string();
    let worked = hooks.worked_key().to_string();

    let mut flags = args.cli.forwarded_flags();
    flags.extend(["--input-file".to_string(), input_file]);
    let launcher = Arc::new(CommandLauncher::current_exe()?.with_flags(flags));

    let command = args.cli.command();
    let mut coordinator = Coordinator::new(ctx, hooks, Arc::new(RealLivenessProbe::new()), launcher, local_handle()?);

    let owns_tallies = command.runs_conductor() && !coordinator.registry().is_duty_alive(DutyId::Conductor).await?;
    if owns_tallies {
        Reconciliation::clear(store.as_ref(), &routed, &worked).await?;
    }

    coordinator.run_until(command, &args.cli.args, shutdown_signal()).await?;

    if owns_tallies {
        let report = Reconciliation::collect(store.as_ref(), &routed, &worked).await?;
        for line in report.lines() {
            duty_info!(DutyTag(Some(DutyId::Conductor)), "{}", line);
            println!("{line}");
        }
    }
    Ok(())
}

/// Resolves with the signal name on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() -> String {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => tokio::select! {
                _ = tokio::signal::ctrl_c() => "SIGINT".to_string(),
                _ = terminate.recv() => "SIGTERM".to_string(),
            },
            Err(e) => {
                tracing::warn!("⚠️  SIGTERM handler unavailable: {}", e);
                wait_for_ctrl_c().await
            }
        }
    }
    #[cfg(not(unix))]
    {
        wait_for_ctrl_c().await
    }
}

async fn wait_for_ctrl_c() -> String {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("⚠️  Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
    "SIGINT".to_string()
}
