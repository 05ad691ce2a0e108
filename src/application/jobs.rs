use crate::application::orchestrator::Orchestrator;
use crate::domain::jobs::JobRecord;
use crate::domain::progress::progress_channel;
use crate::domain::request::{ModelId, RunRequest};
use crate::ports::extractor::ToolStatus;
use crate::ports::repository::JobRepository;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// A job that has been recorded and started.
pub struct Submitted {
    pub job_id: String,
    pub task: JoinHandle<()>,
}

/// Runs each submitted request as a background job tracked in `R`.
pub struct JobService<R> {
    orchestrator: Orchestrator,
    repo: Arc<R>,
}

impl<R> Clone for JobService<R> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: self.orchestrator.clone(),
            repo: self.repo.clone(),
        }
    }
}

impl<R> JobService<R>
where
    R: JobRepository + 'static,
{
    pub fn new(orchestrator: Orchestrator, repo: Arc<R>) -> Self {
        Self { orchestrator, repo }
    }

    pub async fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.repo.get(job_id).await
    }

    pub async fn probe(&self) -> ToolStatus {
        self.orchestrator.probe().await
    }

    pub fn probe_model(&self, model: ModelId) -> ToolStatus {
        self.orchestrator.probe_model(model)
    }

    /// Record a new job and start it. `uploaded` (a file or a staging
    /// directory) is deleted once the run ends, whatever the outcome.
    pub async fn submit(&self, request: RunRequest, uploaded: Option<PathBuf>) -> Submitted {
        let job_id = Uuid::new_v4().to_string();
        self.repo.create(JobRecord::new(&job_id)).await;
        tracing::info!(job_id = %job_id, source = %request.source.display(), "job accepted");

        let orchestrator = self.orchestrator.clone();
        let repo = self.repo.clone();
        let id = job_id.clone();
        let task = tokio::spawn(async move {
            let (tx, mut rx) = progress_channel();

            let drain = {
                let repo = repo.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        repo.record_progress(&id, &event).await;
                    }
                })
            };

            let result = orchestrator.run(&request, Some(tx)).await;
            // Every progress event is applied before the terminal result.
            if let Err(e) = drain.await {
                tracing::warn!(job_id = %id, "progress drain aborted: {}", e);
            }
            if let Some(path) = uploaded {
                remove_upload(&path).await;
            }
            repo.finish(&id, &result).await;
        });

        Submitted { job_id, task }
    }
}

async fn remove_upload(path: &std::path::Path) {
    let removed = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        _ => tokio::fs::remove_file(path).await,
    };
    match removed {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "failed to remove upload: {}", e),
    }
}
