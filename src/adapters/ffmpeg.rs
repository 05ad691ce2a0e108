//! Audio extraction through the `ffmpeg` executable.

use crate::domain::error::PipelineError;
use crate::ports::command::CommandRunner;
use crate::ports::extractor::{AudioExtractor, ToolStatus};
use async_trait::async_trait;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command as TokioCommand;

pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(3600);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const INSTALL_HINT: &str = "FFmpeg is not installed or not on PATH. \
Install it: macOS: brew install ffmpeg | Windows: choco install ffmpeg | Linux: apt install ffmpeg";

pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &Path, args: &[OsString], timeout: Duration) -> io::Result<Output> {
        let child = TokioCommand::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(timeout, child).await {
            Ok(output) => output,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("{} did not finish within {}s", program.display(), timeout.as_secs()),
            )),
        }
    }
}

pub struct FfmpegExtractor<R: CommandRunner> {
    runner: R,
    program: PathBuf,
    timeout: Duration,
}

impl FfmpegExtractor<TokioCommandRunner> {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self::with_runner(TokioCommandRunner, program)
    }
}

impl<R: CommandRunner> FfmpegExtractor<R> {
    pub fn with_runner(runner: R, program: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            program: program.into(),
            timeout: DEFAULT_EXTRACTION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Mono, 44.1 kHz, 16-bit PCM; overwrite; video stream dropped.
    fn extraction_args(source: &Path, dest: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-y", "-i"].iter().map(OsString::from).collect();
        args.push(source.as_os_str().to_owned());
        args.extend(
            [
                "-vn", "-acodec", "pcm_s16le", "-ar", "44100", "-ac", "1", "-loglevel", "error",
            ]
            .iter()
            .map(OsString::from),
        );
        args.push(dest.as_os_str().to_owned());
        args
    }
}

/// First non-empty diagnostic stream of a failed invocation.
fn diagnostics(output: &Output) -> String {
    [&output.stderr, &output.stdout]
        .iter()
        .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
        .find(|text| !text.is_empty())
        .unwrap_or_else(|| String::from("Unknown error"))
}

#[async_trait]
impl<R: CommandRunner> AudioExtractor for FfmpegExtractor<R> {
    async fn extract(&self, source: &Path, dest: &Path) -> Result<(), PipelineError> {
        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            return Err(PipelineError::NotFound(source.to_path_buf()));
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PipelineError::Extraction(format!("cannot create {}: {}", parent.display(), e)))?;
        }

        tracing::debug!(source = %source.display(), dest = %dest.display(), "extracting audio");
        let args = Self::extraction_args(source, dest);
        let output = self
            .runner
            .run(&self.program, &args, self.timeout)
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => PipelineError::Extraction(INSTALL_HINT.to_string()),
                _ => PipelineError::Extraction(e.to_string()),
            })?;

        if !output.status.success() {
            return Err(PipelineError::Extraction(format!(
                "FFmpeg failed to extract audio: {}",
                diagnostics(&output)
            )));
        }

        let size = tokio::fs::metadata(dest).await.map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(PipelineError::Extraction(String::from(
                "FFmpeg produced no output file or empty file.",
            )));
        }
        Ok(())
    }

    async fn probe(&self) -> ToolStatus {
        let args = [OsString::from("-version")];
        match self.runner.run(&self.program, &args, PROBE_TIMEOUT).await {
            Ok(output) if output.status.success() => ToolStatus::ok(),
            Ok(output) => ToolStatus::unavailable(format!("FFmpeg check failed: {}", diagnostics(&output))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => ToolStatus::unavailable(INSTALL_HINT),
            Err(e) => ToolStatus::unavailable(format!("FFmpeg check failed: {}", e)),
        }
    }
}
