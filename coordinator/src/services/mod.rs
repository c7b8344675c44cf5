//! Service implementations
//!
//! Real implementations of the injected traits and the store client. These
//! handle the actual I/O: sockets, child processes and pid probing.

pub mod launcher;
pub mod liveness;
pub mod remote_store;

pub use launcher::{CommandLauncher, NoopLauncher};
pub use liveness::{local_handle, RealLivenessProbe};
pub use remote_store::RemoteStore;
