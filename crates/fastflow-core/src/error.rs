//! Core error types for fastflow-core.
//!
//! Timer errors surface to the caller as typed failures. Storage and
//! notification errors are mostly caught and logged at the service boundary;
//! see [`crate::timer::FastingService`] for which writes are allowed to
//! degrade.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for fastflow-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// `stop()` was called with nothing to stop.
    #[error("No active fast to stop")]
    NoActiveFast,

    /// Storage-related errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by a [`crate::storage::KeyValueStore`] backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Generic backend failure (quota exceeded, unavailable, ...)
    #[error("Storage backend failure: {0}")]
    Backend(String),

    /// SQLite failure from the bundled database backend
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored value could not be decoded
    #[error("Corrupt value stored under '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be encoded for storage
    #[error("Failed to encode value for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by a [`crate::notifications::NotificationGateway`].
///
/// These never reach timer logic; the service logs and drops them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// The host has no local notification capability.
    #[error("Notifications are not supported on this platform")]
    Unsupported,

    /// The user declined notification permission.
    #[error("Notification permission denied")]
    PermissionDenied,

    /// The platform call itself failed.
    #[error("Notification platform error: {0}")]
    Platform(String),
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

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Wall-clock value not in `HH:MM` form
    #[error("Invalid time of day '{0}': expected HH:MM")]
    InvalidTime(String),

    /// Custom fast length outside the accepted range
    #[error("Invalid fasting hours {hours}: must be greater than 0 and at most {max}")]
    InvalidFastingHours { hours: f64, max: f64 },
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_active_fast_message() {
        assert_eq!(CoreError::NoActiveFast.to_string(), "No active fast to stop");
    }

    #[test]
    fn storage_error_converts_into_core_error() {
        let err: CoreError = StorageError::Backend("quota exceeded".into()).into();
        assert!(matches!(err, CoreError::Persistence(StorageError::Backend(_))));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn validation_error_mentions_value() {
        let err = ValidationError::InvalidTime("25:00".into());
        assert!(err.to_string().contains("25:00"));
    }
}
