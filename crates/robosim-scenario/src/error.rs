//! Error types for scenario handling.

use thiserror::Error;

/// Errors raised while reading or validating a scenario description.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// Scenario text is not valid JSON for this schema.
    #[error("scenario parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Scenario file could not be read.
    #[error("failed to read scenario: {0}")]
    Io(#[from] std::io::Error),

    /// Engine settings are out of range.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

/// Result type for scenario operations.
pub type Result<T> = std::result::Result<T, ScenarioError>;
