//! Centralized error types for replyscribe.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the replyscribe library.
#[derive(Error, Debug)]
pub enum ScribeError {
    /// The mail store could not be reached, or the session dropped mid-operation.
    #[error("Mail store unavailable: {0}")]
    MailStoreUnavailable(String),

    /// Style extraction was requested with no writing samples on hand.
    #[error("No writing samples found in '{0}'")]
    InsufficientSamples(PathBuf),

    /// The model failed (twice) to produce a usable style profile.
    #[error("Style extraction failed: {0}")]
    StyleExtractionFailed(String),

    /// Reply generation was requested before any profile was extracted.
    #[error("No style profile at '{0}'; run `replyscribe extract` first")]
    NoStyleProfile(PathBuf),

    /// The model failed to produce a reply for one message.
    #[error("Reply generation failed for '{message_id}': {reason}")]
    GenerationFailed { message_id: String, reason: String },

    /// The generative model endpoint refused or failed the request.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// The generative model did not answer within the configured timeout.
    #[error("Model timed out after {0}s")]
    ModelTimeout(u64),

    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A JSON document could not be read or written.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The requested mail folder does not exist.
    #[error("Folder '{name}' not found. Available: {available}")]
    FolderNotFound { name: String, available: String },

    /// No message with this store identifier.
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The user cancelled the operation.
    #[error("Operation cancelled by user")]
    Cancelled,
}

/// Convenience alias for `Result<T, ScribeError>`.
pub type Result<T> = std::result::Result<T, ScribeError>;

impl ScribeError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error came from the model transport (as opposed to its output).
    pub fn is_model_failure(&self) -> bool {
        matches!(self, Self::ModelUnavailable(_) | Self::ModelTimeout(_))
    }
}

impl From<std::io::Error> for ScribeError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_helper_keeps_path() {
        let err = ScribeError::io(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/tmp/x"));
    }

    #[test]
    fn test_model_failure_classification() {
        assert!(ScribeError::ModelTimeout(5).is_model_failure());
        assert!(ScribeError::ModelUnavailable("down".into()).is_model_failure());
        assert!(!ScribeError::NoStyleProfile(PathBuf::from("p.json")).is_model_failure());
    }
}
