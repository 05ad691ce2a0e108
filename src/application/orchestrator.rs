use crate::application::separator::Separator;
use crate::domain::audio::{count_non_finite, read_wav, write_wav_rescaled};
use crate::domain::error::PipelineError;
use crate::domain::progress::{ProgressReporter, ProgressSender, Stage};
use crate::domain::request::{ModelId, RunRequest};
use crate::domain::stems::StemSet;
use crate::ports::extractor::{AudioExtractor, ToolStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const WORKSPACE_PREFIX: &str = "audiostem_";
const EXTRACTED_WAV: &str = "extracted.wav";

/// Drives one run: extraction, separation, combination.
#[derive(Clone)]
pub struct Orchestrator {
    extractor: Arc<dyn AudioExtractor>,
    separator: Separator,
    workspace_root: Option<PathBuf>,
}

impl Orchestrator {
    pub fn new(extractor: Arc<dyn AudioExtractor>, separator: Separator) -> Self {
        Self {
            extractor,
            separator,
            workspace_root: None,
        }
    }

    /// Allocate workspaces under `root` instead of the system temp dir.
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub async fn probe(&self) -> ToolStatus {
        self.extractor.probe().await
    }

    /// Whether the separation backend can load `model`.
    pub fn probe_model(&self, model: ModelId) -> ToolStatus {
        self.separator.probe(model)
    }

    /// Returns the absolute path of the written file.
    pub async fn run(
        &self,
        request: &RunRequest,
        progress: Option<ProgressSender>,
    ) -> Result<PathBuf, PipelineError> {
        tracing::info!(
            source = %request.source.display(),
            model = %request.model,
            quality = %request.quality,
            "starting run"
        );
        let result = self.run_stages(request, progress).await;
        match &result {
            Ok(path) => tracing::info!(output = %path.display(), "run finished"),
            Err(e) => tracing::error!(kind = ?e.kind(), source = %request.source.display(), "run failed: {}", e),
        }
        result
    }

    async fn run_stages(
        &self,
        request: &RunRequest,
        progress: Option<ProgressSender>,
    ) -> Result<PathBuf, PipelineError> {
        let source = absolute(&request.source)?;
        if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
            return Err(PipelineError::NotFound(source));
        }
        // Fail before extracting when the model can never load.
        let backend = self.separator.probe(request.model);
        if !backend.available {
            return Err(PipelineError::Separation(backend.message));
        }

        let output_dir = absolute(&request.resolved_output_dir())?;
        tokio::fs::create_dir_all(&output_dir).await.map_err(|e| {
            PipelineError::Pipeline(format!("cannot create {}: {}", output_dir.display(), e))
        })?;

        // Removed on drop, whichever way this function exits.
        let workspace = self.allocate_workspace()?;
        tracing::debug!(workspace = %workspace.path().display(), "allocated workspace");

        let mut reporter = ProgressReporter::new(progress);
        reporter.report(Stage::Started);

        let wav_path = workspace.path().join(EXTRACTED_WAV);
        self.extractor.extract(&source, &wav_path).await?;
        reporter.report(Stage::Extracted);

        reporter.report(Stage::Separating);
        let (waveform, sample_rate) = tokio::task::spawn_blocking(move || read_wav(&wav_path))
            .await?
            .map_err(|e| PipelineError::Separation(format!("cannot read extracted audio: {}", e)))?;
        let stems = self
            .separator
            .separate(waveform, sample_rate, request.model, request.quality)
            .await?;
        reporter.report(Stage::Separated);

        reporter.report(Stage::Combining);
        let out_path = output_dir.join(request.output_file_name());
        combine(stems, out_path.clone()).await?;

        if let Err(e) = workspace.close() {
            tracing::warn!("failed to remove workspace: {}", e);
        }
        reporter.report(Stage::Done);
        Ok(out_path)
    }

    fn allocate_workspace(&self) -> Result<TempDir, PipelineError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);
        let dir = match &self.workspace_root {
            Some(root) => {
                std::fs::create_dir_all(root).and_then(|_| builder.tempdir_in(root))
            }
            None => builder.tempdir(),
        };
        dir.map_err(|e| PipelineError::Pipeline(format!("cannot allocate workspace: {}", e)))
    }
}

fn absolute(path: &Path) -> Result<PathBuf, PipelineError> {
    std::path::absolute(path)
        .map_err(|e| PipelineError::Pipeline(format!("cannot resolve {}: {}", path.display(), e)))
}

/// Sum the background categories and write them to `out_path`.
async fn combine(stems: StemSet, out_path: PathBuf) -> Result<(), PipelineError> {
    tokio::task::spawn_blocking(move || {
        tracing::debug!(
            categories = ?stems.names(),
            has_vocals = stems.has_vocals(),
            "combining stems"
        );
        let background = stems.background();
        let bad = count_non_finite(&background);
        if bad > 0 {
            return Err(PipelineError::Combination(format!(
                "model output contains {} non-finite samples",
                bad
            )));
        }
        write_wav_rescaled(&out_path, background, stems.sample_rate()).map_err(|e| {
            PipelineError::Combination(format!("cannot write {}: {}", out_path.display(), e))
        })
    })
    .await?
}
