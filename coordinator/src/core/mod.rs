//! Role state machines and the registry they are built on
//!
//! Every module here talks to the fleet only through `CoordinationStore`;
//! nothing in core spawns processes or touches the filesystem.

pub mod conductor;
pub mod context;
pub mod registry;
pub mod router;
pub mod shutdown;
pub mod status;
pub mod telemetry;
pub mod worker;

pub use conductor::Conductor;
pub use context::{FleetContext, StoreKeys};
pub use registry::DutyRegistry;
pub use router::{RouterLoop, RouterOutcome};
pub use shutdown::ShutdownCoordinator;
pub use status::{DutyStatus, StatusReport};
pub use telemetry::{TelemetryReporter, TelemetrySample};
pub use worker::WorkerLoop;

/// How the conductor sizes the fleet it starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FleetMode {
    /// Clear routing state and fill router plus `max_workers` workers
    Fresh,
    /// Resume feeding the worker queues that still hold messages
    Flush,
}
