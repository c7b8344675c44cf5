//! Shared types for the duty coordination system
//!
//! Contains the pieces every role process agrees on: duty identities, the
//! coordination store contract and its wire protocol, errors and logging.

pub mod errors;
pub mod logging;
pub mod messages;
pub mod store;
pub mod types;

pub use errors::*;
pub use types::*;

pub use messages::{read_frame, write_frame, StoreRequest, StoreResponse};
pub use store::{CoordinationStore, MockCoordinationStore};
