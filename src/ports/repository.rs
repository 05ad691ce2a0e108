use crate::domain::error::PipelineError;
use crate::domain::jobs::JobRecord;
use crate::domain::progress::ProgressEvent;
use async_trait::async_trait;
use std::path::PathBuf;

/// Job records shared between the owning run and status readers.
///
/// One writer per key (the run that created it), any number of readers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, record: JobRecord);

    /// Returns false when the job is unknown or already terminal.
    async fn record_progress(&self, job_id: &str, event: &ProgressEvent) -> bool;

    async fn finish(&self, job_id: &str, result: &Result<PathBuf, PipelineError>);

    async fn get(&self, job_id: &str) -> Option<JobRecord>;
}
