//! Core error types for urge-core.
//!
//! Only [`CoreError::OutOfAllowance`] is an expected control-flow signal for
//! the UI. Storage failures surface as [`CoreError::Persistence`] after the
//! in-memory state has been rolled back; peer failures never leave the
//! companion layer except as log lines.

use std::path::PathBuf;
use thiserror::Error;

use crate::allowance::OutOfAllowance;

/// Core error type for urge-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The daily or panic allowance is exhausted.
    #[error(transparent)]
    OutOfAllowance(#[from] OutOfAllowance),

    /// A durable write failed; the operation was not applied.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Companion link errors
    #[error("Companion sync error: {0}")]
    Sync(#[from] SyncError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The operation needs a completed onboarding.
    #[error("Onboarding has not been completed")]
    NotConfigured,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A write was refused by the backend.
    #[error("Write of '{key}' failed: {message}")]
    WriteFailed { key: String, message: String },

    /// A stored value could not be decoded.
    #[error("Corrupt value for '{key}': {value:?}")]
    Corrupt { key: String, value: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(#[from] std::io::Error),
}

/// Companion link errors. None of these reach the user.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Peer unreachable")]
    PeerUnreachable,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Unknown substance identifier
    #[error("Unknown substance: {0}")]
    UnknownSubstance(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked
                    || err.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

impl CoreError {
    /// True for the one error the UI is expected to handle itself.
    pub fn is_out_of_allowance(&self) -> bool {
        matches!(self, CoreError::OutOfAllowance(_))
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
