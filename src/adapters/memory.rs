//! In-process job store for the web front-end.

use crate::domain::error::PipelineError;
use crate::domain::jobs::JobRecord;
use crate::domain::progress::ProgressEvent;
use crate::ports::repository::JobRepository;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct InMemoryJobStore {
    jobs: Arc<RwLock<HashMap<String, JobRecord>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobStore {
    async fn create(&self, record: JobRecord) {
        self.jobs.write().await.insert(record.id.clone(), record);
    }

    async fn record_progress(&self, job_id: &str, event: &ProgressEvent) -> bool {
        match self.jobs.write().await.get_mut(job_id) {
            Some(job) => job.apply_progress(event),
            None => false,
        }
    }

    async fn finish(&self, job_id: &str, result: &Result<PathBuf, PipelineError>) {
        if let Some(job) = self.jobs.write().await.get_mut(job_id) {
            job.finish(result);
        }
    }

    async fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.jobs.read().await.get(job_id).cloned()
    }
}
