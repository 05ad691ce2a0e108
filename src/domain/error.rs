//! Error taxonomy for a single run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Terminal failure of a run. None of these are retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The source video does not exist.
    #[error("Video file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The extraction executable failed or produced no usable output.
    #[error("Audio extraction failed: {0}")]
    Extraction(String),

    /// Model loading or inference failed.
    #[error("Separation failed: {0}")]
    Separation(String),

    /// The final output could not be produced or written.
    #[error("Combining stems failed: {0}")]
    Combination(String),

    /// Anything unanticipated inside a run.
    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

/// Serializable classification of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Extraction,
    Separation,
    Combination,
    Pipeline,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::NotFound(_) => ErrorKind::NotFound,
            PipelineError::Extraction(_) => ErrorKind::Extraction,
            PipelineError::Separation(_) => ErrorKind::Separation,
            PipelineError::Combination(_) => ErrorKind::Combination,
            PipelineError::Pipeline(_) => ErrorKind::Pipeline,
        }
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        PipelineError::Pipeline(format!("worker task aborted: {}", err))
    }
}

/// Rejected values at the request boundary. These never reach a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Unknown model '{0}'. Choices: htdemucs, mdx_extra_q, htdemucs_6s")]
    UnknownModel(String),

    #[error("Unsupported quality '{0}'. Choices: 1, 2, 5, 10")]
    UnsupportedQuality(String),
}
