//! Core error types for repguard-core.
//!
//! This module defines the error hierarchy using thiserror. Lifecycle
//! components degrade rather than error on bad historical data; the
//! variants here cover the write paths and external collaborators.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for repguard-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Notifier delivery errors
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// A referenced record does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An illegal transition was requested
    #[error("Invalid state for {entity} {id}: {reason}")]
    InvalidState {
        entity: &'static str,
        id: String,
        reason: String,
    },

    /// Stored data violates a model invariant
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

impl CoreError {
    /// Shorthand for a [`CoreError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Shorthand for a [`CoreError::InvalidState`].
    pub fn invalid_state(
        entity: &'static str,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CoreError::InvalidState {
            entity,
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
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

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
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

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Notifier delivery errors.
///
/// Recorded on the reminder as a failure reason, never propagated as a
/// crash out of the dispatcher.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The gateway rejected the request
    #[error("Gateway rejected notification (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Transport-level failure (connect, timeout, worker death)
    #[error("Transport error: {0}")]
    Transport(String),

    /// No usable recipient or gateway for the requested method
    #[error("Notifier not configured: {0}")]
    NotConfigured(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(DatabaseError::from(err))
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
