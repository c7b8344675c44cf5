//! Self-organizing worker pool coordinator
//!
//! One process image that becomes the conductor, the router or a worker
//! depending on the duty it claims at runtime. All coordination goes through a
//! shared `CoordinationStore`; the embedding application supplies the message
//! hooks.

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod core;
pub mod error;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use cli::Cli;
pub use config::Settings;
pub use coordinator::{Command, Coordinator, HELP_TEXT};
pub use core::{DutyRegistry, FleetContext, FleetMode, StatusReport, StoreKeys};
pub use error::{CoordinatorError, CoordinatorResult};
pub use traits::{FleetLauncher, LivenessProbe, MessageHooks};
