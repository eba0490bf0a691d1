use thiserror::Error;

use crate::job::JobStatus;

#[derive(Error, Debug)]
pub enum FukikaeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Dependency check failed: {0}")]
    Dependency(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid job transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

impl FukikaeError {
    /// Errors raised by preflight validation, before any stage has run.
    /// Callers rely on these leaving the job status untouched.
    pub fn is_validation(&self) -> bool {
        matches!(self, FukikaeError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, FukikaeError>;
