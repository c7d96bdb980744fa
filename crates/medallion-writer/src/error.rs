//! Error types for the Parquet writer crate

use std::path::PathBuf;
use thiserror::Error;

/// Maximum number of per-record failures carried by a validation error.
pub const VALIDATION_SAMPLE_LIMIT: usize = 5;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: One or more records failed schema validation
    E001Validation,
    /// E002: Configuration missing, conflicting or invalid
    E002InvalidConfig,
    /// E003: Partition key could not be derived
    E003Partition,
    /// E004: Directory creation or file write failed
    E004WriteFailure,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001Validation => "E001",
            Self::E002InvalidConfig => "E002",
            Self::E003Partition => "E003",
            Self::E004WriteFailure => "E004",
        }
    }
}

/// A single rejected record: its position in the batch and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub index: usize,
    pub message: String,
}

/// Errors that can occur during a write call
#[derive(Debug, Error)]
pub enum WriterError {
    /// Batch rejected; nothing was written
    #[error("[{code}] Validation failed for {failed} of {total} records:\n{}", render_samples(.samples, .remaining))]
    Validation {
        code: &'static str,
        failed: usize,
        total: usize,
        samples: Vec<RecordFailure>,
        remaining: usize,
    },

    /// Invalid or conflicting configuration; raised before any I/O
    #[error("[{code}] Invalid configuration: {message}")]
    InvalidConfig { code: &'static str, message: String },

    /// Partition columns missing or underivable
    #[error("[{code}] Partitioning failed: {message}")]
    Partition { code: &'static str, message: String },

    /// I/O or encoding failure
    #[error("[{code}] Write operation failed for '{}': {source}", .path.display())]
    WriteFailure {
        code: &'static str,
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

fn render_samples(samples: &[RecordFailure], remaining: &usize) -> String {
    let mut lines: Vec<String> = samples
        .iter()
        .map(|f| format!("  Record {}: {}", f.index, f.message))
        .collect();
    if *remaining > 0 {
        lines.push(format!("  ... and {} more errors", remaining));
    }
    lines.join("\n")
}

impl WriterError {
    /// Build a validation error from every failure in a batch of `total` records.
    /// Only the first [`VALIDATION_SAMPLE_LIMIT`] failures are kept.
    pub fn validation(mut failures: Vec<RecordFailure>, total: usize) -> Self {
        let failed = failures.len();
        failures.truncate(VALIDATION_SAMPLE_LIMIT);
        Self::Validation {
            code: ErrorCode::E001Validation.as_str(),
            failed,
            total,
            remaining: failed - failures.len(),
            samples: failures,
        }
    }

    /// Create an invalid config error with error code
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            code: ErrorCode::E002InvalidConfig.as_str(),
            message: message.into(),
        }
    }

    /// Create a partition error with error code
    pub fn partition(message: impl Into<String>) -> Self {
        Self::Partition {
            code: ErrorCode::E003Partition.as_str(),
            message: message.into(),
        }
    }

    /// Create a write failure error carrying the underlying cause
    pub fn write_failure(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::WriteFailure {
            code: ErrorCode::E004WriteFailure.as_str(),
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::E001Validation,
            Self::InvalidConfig { .. } => ErrorCode::E002InvalidConfig,
            Self::Partition { .. } => ErrorCode::E003Partition,
            Self::WriteFailure { .. } => ErrorCode::E004WriteFailure,
        }
    }
}

/// Result type alias for WriterError
pub type Result<T> = std::result::Result<T, WriterError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn failures(n: usize) -> Vec<RecordFailure> {
        (0..n)
            .map(|i| RecordFailure {
                index: i * 2,
                message: format!("vin: bad {}", i),
            })
            .collect()
    }

    #[test]
    fn test_validation_keeps_five_samples() {
        let err = WriterError::validation(failures(8), 20);
        match &err {
            WriterError::Validation {
                failed,
                total,
                samples,
                remaining,
                ..
            } => {
                assert_eq!(*failed, 8);
                assert_eq!(*total, 20);
                assert_eq!(samples.len(), VALIDATION_SAMPLE_LIMIT);
                assert_eq!(*remaining, 3);
            }
            other => panic!("unexpected error: {other}"),
        }

        let text = err.to_string();
        assert!(text.starts_with("[E001] Validation failed for 8 of 20 records:"));
        assert!(text.contains("Record 8: vin: bad 4"));
        assert!(!text.contains("Record 10:"));
        assert!(text.ends_with("... and 3 more errors"));
    }

    #[test]
    fn test_validation_without_overflow() {
        let text = WriterError::validation(failures(2), 2).to_string();
        assert!(!text.contains("more errors"));
    }

    #[test]
    fn test_write_failure_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = WriterError::write_failure("/out/data.parquet", io);
        assert_eq!(err.code(), ErrorCode::E004WriteFailure);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("/out/data.parquet"));
    }
}
