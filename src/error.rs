// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Stage '{stage}' failed: {message}")]
    StageExecution { stage: String, message: String },

    #[error("Artifact not found: {path}")]
    MissingArtifact { path: PathBuf },

    #[error("Summarization service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Publish step '{step}' failed: {message}")]
    SyncStep { step: String, message: String },

    #[error("Monitor error: {0}")]
    Monitor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StageExecution {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn sync_step(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SyncStep {
            step: step.into(),
            message: message.into(),
        }
    }
}
