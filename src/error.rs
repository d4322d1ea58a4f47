//! Domain-specific error types for audit-report

use thiserror::Error;

use crate::clients::GenerationError;

/// Main error type for report building and export
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Recommendation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Image encoding error: {message}")]
    Encoding { message: String },

    #[error("Export error: {message}")]
    Export { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReportError {
    pub fn validation(message: impl Into<String>) -> Self {
        ReportError::Validation {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        ReportError::Config {
            message: message.into(),
        }
    }

    /// True for failures that leave the report untouched and only abort the
    /// current submission.
    pub fn is_submission_error(&self) -> bool {
        matches!(
            self,
            ReportError::Validation { .. } | ReportError::Generation(_)
        )
    }
}

impl From<csv::Error> for ReportError {
    fn from(err: csv::Error) -> Self {
        ReportError::Export {
            message: format!("CSV encoding failed: {}", err),
        }
    }
}

impl From<lopdf::Error> for ReportError {
    fn from(err: lopdf::Error) -> Self {
        ReportError::Export {
            message: format!("PDF encoding failed: {}", err),
        }
    }
}

impl From<image::ImageError> for ReportError {
    fn from(err: image::ImageError) -> Self {
        ReportError::Encoding {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ReportError {
    fn from(err: toml::de::Error) -> Self {
        ReportError::Config {
            message: format!("Invalid config file: {}", err),
        }
    }
}

/// Result type alias for report operations
pub type Result<T> = std::result::Result<T, ReportError>;
