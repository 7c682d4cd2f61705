//! Error types for pdf-squeeze operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pdf-squeeze operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while compressing or evaluating PDFs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A required external tool is not installed or not on PATH.
    #[error("Tool not found: {0}")]
    ToolMissing(String),

    /// An external tool exited unsuccessfully.
    #[error("{tool} failed (exit code {code}): {stderr}")]
    ToolFailed {
        /// Tool name (gs, qpdf, pdftk, ...).
        tool: String,
        /// Exit code, or "signal" when killed.
        code: String,
        /// Trimmed standard error output.
        stderr: String,
    },

    /// An external tool exceeded its time limit and was killed.
    #[error("{tool} timed out after {seconds}s")]
    ToolTimeout {
        /// Tool name.
        tool: String,
        /// Time limit in seconds.
        seconds: u64,
    },

    /// A PDF could not be rasterized for quality comparison.
    #[error("Rasterization failed: {path}: {reason}")]
    Rasterize {
        /// Path of the PDF.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Failed to load a rasterized page image.
    #[error("Image load failed: {path}: {reason}")]
    ImageLoad {
        /// Path to the image that failed to load.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Failed to calculate a quality metric.
    #[error("Metric calculation failed: {metric}: {reason}")]
    MetricCalculation {
        /// Name of the metric that failed.
        metric: String,
        /// Reason for the failure.
        reason: String,
    },

    /// Configuration value outside its valid range.
    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig {
        /// Offending field name.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Input path is missing or not a usable PDF location.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Shorthand for an [`Error::InvalidConfig`].
    pub(crate) fn config(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
