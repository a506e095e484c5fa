//! Error types for the EssayFlow engine

use thiserror::Error;

/// Main error type for all EssayFlow operations
#[derive(Error, Debug)]
pub enum EssayflowError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("State store error: {0}")]
    Store(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Missing required artifact: {0}")]
    MissingArtifact(String),

    #[error("Stage error: {0}")]
    Stage(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Rate limited by generation service: {0}")]
    RateLimited(String),

    #[error("Generation retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl EssayflowError {
    /// Transient upstream failures (rate limit / overload) are the only
    /// retryable class; everything else propagates immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

/// Result type for EssayFlow operations
pub type Result<T> = std::result::Result<T, EssayflowError>;
