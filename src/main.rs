use audiostem::adapters::http::{router, AppState};
use audiostem::adapters::memory::InMemoryJobStore;
use audiostem::application::jobs::JobService;
use audiostem::{Config, ModelId};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    for dir in [&config.upload_dir, &config.output_dir] {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            tracing::error!(dir = %dir.display(), "cannot create directory: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let orchestrator = config.orchestrator();
    let ffmpeg = orchestrator.probe().await;
    if !ffmpeg.available {
        tracing::warn!("{}", ffmpeg.message);
    }
    for model in ModelId::ALL {
        let status = orchestrator.probe_model(model);
        if !status.available {
            tracing::warn!(model = %model, "{}", status.message);
        }
    }

    let state = AppState {
        jobs: JobService::new(orchestrator, Arc::new(InMemoryJobStore::new())),
        upload_dir: config.upload_dir.clone(),
        output_dir: config.output_dir.clone(),
        max_upload_bytes: config.max_upload_bytes,
    };
    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(config.bind_addr()).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %config.bind_addr(), "failed to bind TCP listener: {}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("AudioStem-Pro web UI: http://{}", config.bind_addr());
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server failed: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
