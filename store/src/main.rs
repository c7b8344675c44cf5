//! Store server binary
//!
//! Hosts the shared coordination store that conductor, router and worker
//! processes connect to.

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

use shared::logging;
use store::{MemoryStore, StoreServer};

/// In-memory coordination store for the duty fleet
#[derive(Parser)]
#[command(name = "store")]
#[command(about = "Serves the shared coordination store over TCP")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:6380")]
    bind: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_tracing(Some(&args.log_level), None)?;

    let server = StoreServer::bind(Arc::new(MemoryStore::new()), args.bind).await?;

    tokio::select! {
        result = server.serve() => result?,
        _ = signal::ctrl_c() => tracing::info!("🛑 Store shutting down"),
    }
    Ok(())
}
