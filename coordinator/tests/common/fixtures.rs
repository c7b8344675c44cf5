//! Test fixtures and data for coordinator tests
//!
//! Settings are scaled down so blocking waits and telemetry ticks take
//! milliseconds instead of seconds.

use std::time::Duration;

use coordinator::Settings;

pub struct TestFixtures;

impl TestFixtures {
    pub const HOST: &'static str = "test-host";
    pub const NAMESPACE: &'static str = "test";
    pub const SENTINEL: &'static str = "stop";

    /// Upper bound for any condition a test waits on
    pub const PATIENCE: Duration = Duration::from_secs(5);

    pub fn settings(max_workers: u8) -> Settings {
        Settings {
            namespace: Self::NAMESPACE.to_string(),
            stop_action: Self::SENTINEL.to_string(),
            need_timeout: Duration::from_millis(300),
            queue_timeout: Duration::from_millis(50),
            kill_timeout: Duration::from_millis(20),
            stats_period: Duration::from_millis(50),
            poll_interval: Duration::from_millis(5),
            max_workers,
            log_file: None,
            ..Settings::default()
        }
    }

    /// Messages whose affinity keys arrive as A, B, A
    pub fn interleaved_messages() -> Vec<String> {
        vec!["A1".to_string(), "B1".to_string(), "A2".to_string()]
    }
}
