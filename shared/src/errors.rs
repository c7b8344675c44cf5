//! Shared error types for the duty coordination system

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Invalid duty name: {input}")]
    InvalidDuty { input: String },

    #[error("Invalid process handle: {input}")]
    InvalidProcessHandle { input: String },

    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfig { field: String, value: String },

    #[error("Store operation failed: {message}")]
    StoreError { message: String },

    #[error("Message protocol error: {message}")]
    ProtocolError { message: String },

    #[error("Serialization failed: {message}")]
    SerializationError { message: String },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SharedError {
    pub fn store(message: impl Into<String>) -> Self {
        Self::StoreError { message: message.into() }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::ProtocolError { message: message.into() }
    }
}

pub type SharedResult<T> = Result<T, SharedError>;
