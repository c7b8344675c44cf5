//! Coordinator-specific error types

use thiserror::Error;
use shared::{DutyId, SharedError};

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Duty {duty} already claimed by live process {owner}")]
    DutyConflict { duty: DutyId, owner: String },

    #[error("Fleet state inconsistent: {message}")]
    InvariantViolation { message: String },

    #[error("Duty request unknown: {request}")]
    UnknownDutyRequest { request: String },

    #[error("Interrupted by {signal}")]
    Interrupted { signal: String },

    #[error("Configuration error: {field}: {message}")]
    ConfigurationError { field: String, message: String },

    #[error("Message processing failed: {message}")]
    HookError { message: String },

    #[error("Fleet launch failed: {message}")]
    LaunchError { message: String },

    #[error("Process probe failed: {message}")]
    ProbeError { message: String },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Settings file error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

impl CoordinatorError {
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation { message: message.into() }
    }

    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn hook(message: impl Into<String>) -> Self {
        Self::HookError { message: message.into() }
    }

    pub fn launch(message: impl Into<String>) -> Self {
        Self::LaunchError { message: message.into() }
    }
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
