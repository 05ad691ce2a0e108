//! Desktop-style front-end: one run, progress on the console.

use audiostem::application::worker::{RunWorker, WorkerMessage};
use audiostem::{Config, ModelId, Quality, RunRequest};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Extract the background music (everything but vocals) from a video.
#[derive(Debug, Parser)]
#[command(name = "audiostem-cli", version)]
struct Args {
    /// Source video (.mp4, .mov, ...)
    input: PathBuf,

    /// Output directory [default: <video dir>/AudioStem-Pro_output]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Separation model: htdemucs, mdx_extra_q or htdemucs_6s
    #[arg(short, long, default_value_t = ModelId::default())]
    model: ModelId,

    /// Shift passes: 1 (fast), 2 (balanced), 5 (high) or 10 (best)
    #[arg(short, long, default_value_t = Quality::default())]
    quality: Quality,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = Config::from_env();
    let orchestrator = config.orchestrator();

    let ffmpeg = orchestrator.probe().await;
    if !ffmpeg.available {
        tracing::error!("{}", ffmpeg.message);
        return ExitCode::FAILURE;
    }
    let backend = orchestrator.probe_model(args.model);
    if !backend.available {
        tracing::error!(model = %args.model, "{}", backend.message);
        return ExitCode::FAILURE;
    }

    let mut request = RunRequest::new(args.input)
        .with_model(args.model)
        .with_quality(args.quality);
    if let Some(dir) = args.output {
        request = request.with_output_dir(dir);
    }
    tracing::info!(model = args.model.label(), quality = args.quality.label(), "starting");

    let mut worker = match RunWorker::spawn(orchestrator, request) {
        Ok(worker) => worker,
        Err(e) => {
            tracing::error!("cannot start worker thread: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut code = ExitCode::SUCCESS;
    while let Some(message) = worker.recv().await {
        match message {
            WorkerMessage::Status(label) => tracing::info!("{}", label),
            WorkerMessage::Progress(percent) => tracing::info!(percent, "progress"),
            WorkerMessage::Finished(dir) => tracing::info!(output_dir = %dir.display(), "background music saved"),
            WorkerMessage::Failed(message) => {
                tracing::error!("{}", message);
                code = ExitCode::FAILURE;
            }
        }
    }
    worker.join();
    code
}
