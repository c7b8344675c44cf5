//! Shared logging utilities for consistent tracing across all role processes

use chrono::{DateTime, Utc};
use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing::{error, info};

use crate::errors::SharedResult;
use crate::types::DutyId;

/// Log label for a process: its duty once established, `pending` before
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyTag(pub Option<DutyId>);

impl fmt::Display for DutyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(duty) => write!(f, "{duty}"),
            None => write!(f, "pending"),
        }
    }
}

impl From<DutyId> for DutyTag {
    fn from(duty: DutyId) -> Self {
        DutyTag(Some(duty))
    }
}

fn level_filter(base_level: &str) -> String {
    format!("coordinator={base_level},store={base_level},tester={base_level},shared={base_level}")
}

/// Initialize the tracing subscriber
///
/// Events go to `log_file` (appended, no colours) when one is given, otherwise
/// to stdout. `RUST_LOG` overrides the level filter when set.
pub fn init_tracing(log_level: Option<&str>, log_file: Option<&Path>) -> SharedResult<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let base_level = log_level.unwrap_or("info");
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_filter(base_level)));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let _ = fmt()
                .with_env_filter(env_filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false)
                .try_init();
        }
        None => {
            let _ = fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .try_init();
        }
    }
    Ok(())
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Macro for duty-aware info logging
#[macro_export]
macro_rules! duty_info {
    ($duty:expr, $($arg:tt)*) => {
        tracing::info!(
            duty = %$duty,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for duty-aware warning logging
#[macro_export]
macro_rules! duty_warn {
    ($duty:expr, $($arg:tt)*) => {
        tracing::warn!(
            duty = %$duty,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for duty-aware error logging
#[macro_export]
macro_rules! duty_error {
    ($duty:expr, $($arg:tt)*) => {
        tracing::error!(
            duty = %$duty,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for duty-aware debug logging
#[macro_export]
macro_rules! duty_debug {
    ($duty:expr, $($arg:tt)*) => {
        tracing::debug!(
            duty = %$duty,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Log an operator-facing line and echo it to stdout
pub fn log_and_echo(duty: DutyTag, message: &str) {
    info!(duty = %duty, timestamp = format_timestamp(), "{}", message);
    println!("{message}");
}

/// Contextual logging helper for error conditions, including the source chain
pub fn log_error(duty: DutyTag, context: &str, error: &dyn std::error::Error) {
    let mut trace = String::new();
    let mut source = error.source();
    while let Some(cause) = source {
        trace.push_str("\n  caused by: ");
        trace.push_str(&cause.to_string());
        source = cause.source();
    }
    error!(
        duty = %duty,
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}{}",
        context,
        error,
        trace
    );
}
