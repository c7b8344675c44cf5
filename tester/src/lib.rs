//! Line-file test application for the coordinator
//!
//! Feeds the fleet one message per line of an input file, keys affinity on
//! the first character, and tallies every routed and worked line in the store
//! so a run can be reconciled once the conductor stops.
//!
//! ## Quick Start
//!
//! ```text
//! store &                 # coordination store on 127.0.0.1:6380
//! tester start &          # conductor, fresh fleet
//! tester duty & tester duty &
//! tester check
//! tester stop
//! ```

pub mod hooks;
pub mod report;
pub mod settings;

pub use hooks::LineFileHooks;
pub use report::Reconciliation;
pub use settings::TesterSettings;
