//! Core error types for courseplan-core.
//!
//! Expected outcomes of schedule commands (a time conflict, a switch
//! opportunity, an infeasible generation request) are *not* errors: they are
//! returned as typed values from [`crate::selection`] and [`crate::generator`].
//! The types here cover the things that can genuinely go wrong: malformed
//! input data, storage failures, configuration problems and optimistic
//! concurrency conflicts on plan writes.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for courseplan-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Plan store errors
    #[error("Plan store error: {0}")]
    Store(#[from] StoreError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
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

    /// Unknown configuration key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be resolved or created
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Validation errors raised while ingesting session data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range: end ({end}) must be greater than start ({start})")]
    InvalidTimeRange { start: u16, end: u16 },

    /// Unparseable clock time
    #[error("Invalid time '{0}'")]
    InvalidTime(String),

    /// Unparseable day pattern
    #[error("Invalid meeting days '{0}'")]
    InvalidDays(String),
}

/// Errors from the persisted-plan collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The stored version moved on since the caller last read it.
    ///
    /// Retryable: re-fetch the plan, re-apply the change, save again.
    #[error("plan for '{student}' changed concurrently (expected version {expected}, found {actual})")]
    VersionConflict {
        student: String,
        expected: u64,
        actual: u64,
    },

    /// The stored snapshot could not be decoded.
    #[error("stored plan for '{student}' is unreadable: {message}")]
    Corrupt { student: String, message: String },

    /// The data directory holding the database could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl StoreError {
    /// Whether the caller should re-fetch and retry the write.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. } | StoreError::Database(DatabaseError::Locked))
    }
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked
                    || err.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.into())
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
