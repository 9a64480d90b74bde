//! Error types for geoload
//!
//! Every failure is fatal to an ingestion run. The variants group into the
//! startup, structural input, checkpoint, sink and configuration families so
//! the message printed on exit names the offending file, line, field or item.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for geoload operations
pub type Result<T> = std::result::Result<T, GeoloadError>;

/// Main error type for geoload
#[derive(Error, Debug)]
pub enum GeoloadError {
    #[error("Startup error: {0}")]
    Startup(String),

    #[error("Cannot open input '{}': {source}", path.display())]
    InputOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Input is empty: no header row found")]
    EmptyInput,

    #[error("Malformed row at line {line}: {reason}: {raw}")]
    MalformedRow {
        line: u64,
        raw: String,
        reason: String,
    },

    #[error("Parse error in field '{field}': cannot parse '{value}'")]
    Parse { field: String, value: String },

    #[error("Checkpoint I/O error on '{}': {source}", path.display())]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Bulk request rejected {failed} item(s): {sample}")]
    BulkItems { failed: usize, sample: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GeoloadError {
    /// Create a startup error
    pub fn startup(msg: impl Into<String>) -> Self {
        Self::Startup(msg.into())
    }

    /// Create a sink error
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a field parse error
    pub fn parse(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Parse {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether the error came from the input file's content rather than the environment.
    ///
    /// Structural errors will fail again on rerun until the input is fixed.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            GeoloadError::MalformedRow { .. }
                | GeoloadError::Parse { .. }
                | GeoloadError::EmptyInput
        )
    }
}
