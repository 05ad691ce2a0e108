use super::error::{ErrorKind, PipelineError};
use super::progress::ProgressEvent;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Starting,
    Running,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

/// Front-end view of one run, keyed by a generated id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub output_path: Option<PathBuf>,
    pub output_filename: Option<String>,
    pub error_kind: Option<ErrorKind>,
}

impl JobRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Starting,
            progress: 0,
            message: String::from("Starting…"),
            output_path: None,
            output_filename: None,
            error_kind: None,
        }
    }

    /// Returns false when the record is already terminal.
    pub fn apply_progress(&mut self, event: &ProgressEvent) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = JobStatus::Running;
        self.progress = event.percent;
        self.message = event.label.clone();
        true
    }

    pub fn finish(&mut self, result: &Result<PathBuf, PipelineError>) {
        match result {
            Ok(path) => self.succeed(path),
            Err(e) => self.fail(e),
        }
    }

    fn succeed(&mut self, path: &Path) {
        self.status = JobStatus::Done;
        self.progress = 100;
        self.message = String::from("Done");
        self.output_path = Some(path.to_path_buf());
        self.output_filename = path.file_name().map(|n| n.to_string_lossy().into_owned());
        self.error_kind = None;
    }

    fn fail(&mut self, err: &PipelineError) {
        self.status = JobStatus::Error;
        self.progress = 0;
        self.message = err.to_string();
        self.error_kind = Some(err.kind());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::progress::Stage;

    #[test]
    fn test_new_record_is_starting() {
        let job = JobRecord::new("abc");
        assert_eq!(job.status, JobStatus::Starting);
        assert_eq!(job.progress, 0);
        assert_eq!(job.message, "Starting…");
    }

    #[test]
    fn test_progress_moves_to_running() {
        let mut job = JobRecord::new("abc");
        assert!(job.apply_progress(&ProgressEvent::from(Stage::Separating)));
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.progress, 35);
        assert_eq!(job.message, "Running AI separation (Demucs)…");
    }

    #[test]
    fn test_success_sets_output() {
        let mut job = JobRecord::new("abc");
        job.finish(&Ok(PathBuf::from("/out/clip_background_music.wav")));
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.progress, 100);
        assert_eq!(job.message, "Done");
        assert_eq!(
            job.output_filename.as_deref(),
            Some("clip_background_music.wav")
        );
    }

    #[test]
    fn test_failure_resets_progress_and_keeps_kind() {
        let mut job = JobRecord::new("abc");
        job.apply_progress(&ProgressEvent::from(Stage::Separated));
        job.finish(&Err(PipelineError::Separation("out of memory".into())));
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.progress, 0);
        assert_eq!(job.error_kind, Some(ErrorKind::Separation));
        assert!(job.message.contains("out of memory"));
    }

    #[test]
    fn test_terminal_record_ignores_progress() {
        let mut job = JobRecord::new("abc");
        job.finish(&Ok(PathBuf::from("/out/a.wav")));
        assert!(!job.apply_progress(&ProgressEvent::from(Stage::Combining)));
        assert_eq!(job.progress, 100);
        assert_eq!(job.status, JobStatus::Done);
    }
}
