//! Error types for the finance tutor client

use thiserror::Error;

use crate::models::Operation;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, TutorError>;

#[derive(Error, Debug)]
pub enum TutorError {

    // =============================
    // Call-site Errors
    // =============================

    #[error("Upload failed: {0}")]
    UploadError(String),

    #[error("Failed to get sample data: {0}")]
    SampleDataError(String),

    #[error("Failed to refresh dashboard: {0}")]
    DashboardError(String),

    #[error("Failed to get explanation: {0}")]
    ExplainError(String),

    #[error("Failed to generate persona: {0}")]
    PersonaError(String),

    #[error("Health check failed: {0}")]
    HealthError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // Response Errors
    // =============================

    #[error("unexpected response shape: {0}")]
    ShapeError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TutorError {
    /// Collapse any failure detail into the error of the operation it happened in.
    pub fn for_operation(operation: Operation, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match operation {
            Operation::Upload => TutorError::UploadError(detail),
            Operation::SampleData => TutorError::SampleDataError(detail),
            Operation::Dashboard => TutorError::DashboardError(detail),
            Operation::Explain => TutorError::ExplainError(detail),
            Operation::Persona => TutorError::PersonaError(detail),
            Operation::Health => TutorError::HealthError(detail),
        }
    }
}
