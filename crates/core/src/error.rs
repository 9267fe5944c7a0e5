//! Error types for TechAssist.
//!
//! A single error enum covers every failure category in the workspace:
//! configuration, I/O, backend calls, ingestion, indexing and the agent
//! pipeline. Agent-facing operations catch the pipeline variants and degrade
//! to fixed user-facing strings; only provisioning failures reach the caller.

use thiserror::Error;

/// Unified error type for TechAssist.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Text-generation or embedding backend errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge store errors (persistence, configuration)
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// A single corpus file could not be parsed
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// The knowledge index has no active generation
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// Building a new index generation failed; the previous one stays active
    #[error("Index rebuild failed: {0}")]
    IndexRebuild(String),

    /// The classification call failed or returned something unusable
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Answer synthesis failed
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// The responder failed while handling an escalated query
    #[error("Delegation error: {0}")]
    Delegation(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Other(format!("{:#}", err))
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
