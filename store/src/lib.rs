//! Coordination store implementations
//!
//! `MemoryStore` keeps hashes and lists in process memory and is what the
//! store server exposes over TCP. Tests use it directly as the shared store for
//! several role instances running in one process.

pub mod memory;
pub mod server;

pub use memory::MemoryStore;
pub use server::StoreServer;
