//! Error types for the bmi_core library.

use crate::MeasurementRecord;
use std::io;
use std::path::PathBuf;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for bmi_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Rejected user input (bad number, non-positive value, empty username)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The store file could not be written
    #[error("Failed to write store {path:?}: {source}")]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A measurement was computed but could not be persisted.
    ///
    /// Carries the record so the caller can still display it.
    #[error("Measurement computed but not saved: {source}")]
    NotPersisted {
        record: Box<MeasurementRecord>,
        #[source]
        source: Box<Error>,
    },

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build an `InvalidInput` error from any message
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// True for errors caused by what the user typed
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Error::InvalidInput(_))
    }
}
