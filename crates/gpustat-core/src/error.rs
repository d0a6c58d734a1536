//! Error types for gpustat

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Main error type for gpustat
#[derive(Error, Debug)]
pub enum GpustatError {
    /// No records found in the requested range. Distinct from a range with
    /// records but zero percent usage.
    #[error("no records found between {start} and {end}")]
    MissingData {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Invalid query parameters (end before start, zero bucket width, ...)
    #[error("invalid analysis range: {0}")]
    InvalidRange(String),

    /// A stored record could not be interpreted. Timestamp integrity
    /// underlies bucket assignment, so this is fatal to the whole query.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage error (unreadable partition, failed query)
    #[error("storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for gpustat operations
pub type GpustatResult<T> = Result<T, GpustatError>;

impl From<toml::de::Error> for GpustatError {
    fn from(err: toml::de::Error) -> Self {
        GpustatError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GpustatError::InvalidRange("end 2025-01-01 precedes start".to_string());
        assert_eq!(
            err.to_string(),
            "invalid analysis range: end 2025-01-01 precedes start"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GpustatError = io_err.into();
        assert!(matches!(err, GpustatError::Io(_)));
    }
}
