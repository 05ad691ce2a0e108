use crate::domain::error::PipelineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Availability of an external tool or inference backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolStatus {
    pub available: bool,
    pub message: String,
}

impl ToolStatus {
    pub fn ok() -> Self {
        Self {
            available: true,
            message: String::new(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            available: false,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Write a mono 44.1 kHz 16-bit PCM WAV of `source`'s audio to `dest`,
    /// overwriting it.
    async fn extract(&self, source: &Path, dest: &Path) -> Result<(), PipelineError>;

    /// Check that the extraction tool can be invoked at all.
    async fn probe(&self) -> ToolStatus;
}
