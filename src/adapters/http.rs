//! Browser front-end: upload, poll progress, download.

use crate::application::jobs::JobService;
use crate::domain::jobs::{JobRecord, JobStatus};
use crate::domain::request::{ModelId, Quality, RunRequest};
use crate::ports::repository::JobRepository;
use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    BoxError, Json, Router,
};
use futures::{Stream, TryStreamExt};
use serde::Serialize;
use serde_json::json;
use std::io;
use std::path::{Path, PathBuf};
use tokio::{fs::File, io::BufWriter};
use tokio_util::io::{ReaderStream, StreamReader};
use uuid::Uuid;

pub const ALLOWED_EXTENSIONS: [&str; 6] = ["mp4", "mov", "avi", "mkv", "webm", "m4v"];

pub struct AppState<R> {
    pub jobs: JobService<R>,
    /// Each upload is staged in its own subdirectory here.
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
            upload_dir: self.upload_dir.clone(),
            output_dir: self.output_dir.clone(),
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

pub fn router<R: JobRepository + 'static>(state: AppState<R>) -> Router {
    let limit = state.max_upload_bytes;
    Router::new()
        .route("/", get(root))
        .route("/upload", post(upload_media::<R>))
        .route("/progress/:job_id", get(progress::<R>))
        .route("/download/:job_id", get(download::<R>))
        .route("/health", get(health::<R>))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

/// JSON `{"error": ...}` with a status code.
#[derive(Debug)]
pub struct ApiError(StatusCode, String);

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self(StatusCode::BAD_REQUEST, message.into())
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self(StatusCode::NOT_FOUND, message.into())
    }

    fn internal(message: impl Into<String>) -> Self {
        Self(StatusCode::INTERNAL_SERVER_ERROR, message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ProgressView {
    status: JobStatus,
    progress: u8,
    message: String,
    output_filename: Option<String>,
}

impl From<JobRecord> for ProgressView {
    fn from(job: JobRecord) -> Self {
        Self {
            status: job.status,
            progress: job.progress,
            message: job.message,
            output_filename: job.output_filename,
        }
    }
}

async fn upload_media<R: JobRepository + 'static>(
    State(state): State<AppState<R>>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let staging = state.upload_dir.join(Uuid::new_v4().to_string());
    let received = receive_upload(&staging, &mut multipart).await;
    let (source, model, quality) = match received {
        Ok(upload) => upload,
        Err(e) => {
            let _ = tokio::fs::remove_dir_all(&staging).await;
            return Err(e);
        }
    };

    let request = RunRequest::new(source)
        .with_output_dir(&state.output_dir)
        .with_model(model)
        .with_quality(quality);
    let submitted = state.jobs.submit(request, Some(staging)).await;
    Ok(Json(json!({ "job_id": submitted.job_id })))
}

/// Stream the file field to `staging` and read the form options.
async fn receive_upload(
    staging: &Path,
    multipart: &mut Multipart,
) -> Result<(PathBuf, ModelId, Quality), ApiError> {
    let mut source = None;
    let mut model = ModelId::default();
    let mut quality = Quality::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "file" => {
                let raw_name = field.file_name().unwrap_or_default().to_owned();
                if raw_name.is_empty() {
                    return Err(ApiError::bad_request("No file selected"));
                }
                let file_name = secure_filename(&raw_name)
                    .filter(|name| allowed_file(name))
                    .ok_or_else(|| ApiError::bad_request("File type not allowed. Use .mp4, .mov, etc."))?;

                tokio::fs::create_dir_all(staging)
                    .await
                    .map_err(|e| ApiError::internal(e.to_string()))?;
                let path = staging.join(&file_name);
                tracing::info!(path = %path.display(), "saving upload");
                stream_to_file(&path, field).await?;
                source = Some(path);
            }
            "model_name" => {
                let text = field.text().await.map_err(|e| ApiError::bad_request(e.body_text()))?;
                model = parse_model(&text);
            }
            "shifts" => {
                let text = field.text().await.map_err(|e| ApiError::bad_request(e.body_text()))?;
                quality = parse_quality(&text);
            }
            _ => continue,
        }
    }

    let source = source.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    Ok((source, model, quality))
}

/// Unknown models fall back to the default.
fn parse_model(text: &str) -> ModelId {
    text.trim().parse().unwrap_or_default()
}

/// Unsupported shift counts fall back to the default.
fn parse_quality(text: &str) -> Quality {
    text.trim().parse().unwrap_or_default()
}

async fn progress<R: JobRepository + 'static>(
    State(state): State<AppState<R>>,
    UrlPath(job_id): UrlPath<String>,
) -> Result<Json<ProgressView>, ApiError> {
    state
        .jobs
        .get(&job_id)
        .await
        .map(|job| Json(ProgressView::from(job)))
        .ok_or_else(|| ApiError::not_found("Unknown job"))
}

async fn download<R: JobRepository + 'static>(
    State(state): State<AppState<R>>,
    UrlPath(job_id): UrlPath<String>,
) -> Result<Response, ApiError> {
    let job = state
        .jobs
        .get(&job_id)
        .await
        .ok_or_else(|| ApiError::not_found("Unknown job"))?;

    let not_ready = || ApiError::not_found("Output not ready or expired");
    let path = job.output_path.ok_or_else(not_ready)?;
    let file = File::open(&path).await.map_err(|_| not_ready())?;
    let filename = job
        .output_filename
        .or_else(|| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| String::from("background_music.wav"));

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        [
            (header::CONTENT_TYPE, String::from("audio/wav")),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}

async fn health<R: JobRepository + 'static>(State(state): State<AppState<R>>) -> Json<serde_json::Value> {
    let ffmpeg = state.jobs.probe().await;
    let separator = state.jobs.probe_model(ModelId::default());
    let models: serde_json::Map<String, serde_json::Value> = ModelId::ALL
        .iter()
        .map(|m| (m.as_str().to_string(), json!(state.jobs.probe_model(*m).available)))
        .collect();
    Json(json!({
        "ffmpeg_ok": ffmpeg.available,
        "ffmpeg_message": ffmpeg.message,
        "separator_ok": separator.available,
        "separator_message": separator.message,
        "models": models,
    }))
}

// Save a `Stream` to a file
async fn stream_to_file<S, E>(path: &Path, stream: S) -> Result<(), ApiError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    async {
        let body_with_io_error = stream.map_err(|err| io::Error::new(io::ErrorKind::Other, err));
        let body_reader = StreamReader::new(body_with_io_error);
        futures::pin_mut!(body_reader);

        let mut file = BufWriter::new(File::create(path).await?);
        tokio::io::copy(&mut body_reader, &mut file).await?;
        tokio::io::AsyncWriteExt::flush(&mut file).await?;

        Ok::<_, io::Error>(())
    }
    .await
    .map_err(|err| ApiError::internal(err.to_string()))
}

/// Final path component with anything outside `[A-Za-z0-9._-]` replaced.
fn secure_filename(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn allowed_file(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

async fn root() -> Html<String> {
    let models = ModelId::ALL
        .iter()
        .map(|m| format!("<option value=\"{}\">{}</option>", m.as_str(), m.label()))
        .collect::<String>();
    let qualities = Quality::ALL
        .iter()
        .map(|q| format!("<option value=\"{}\">{}</option>", q, q.label()))
        .collect::<String>();
    let accept = ALLOWED_EXTENSIONS
        .iter()
        .map(|ext| format!(".{}", ext))
        .collect::<Vec<_>>()
        .join(",");

    Html(format!(
        r#"
        <!doctype html>
        <html>
            <head>
                <title>AudioStem-Pro</title>
            </head>
            <body>
                <h1>Extract background music</h1>
                <form id="upload" action="/upload" method="post" enctype="multipart/form-data">
                    <div>
                        <label>
                            Video:
                            <input type="file" name="file" accept="{}">
                        </label>
                    </div>
                    <div>
                        <label>Model: <select name="model_name">{}</select></label>
                    </div>
                    <div>
                        <label>Quality: <select name="shifts">{}</select></label>
                    </div>
                    <div>
                        <input type="submit" value="Upload">
                    </div>
                </form>
                <p id="status"></p>
                <script>
                    const form = document.getElementById("upload");
                    const status = document.getElementById("status");
                    form.addEventListener("submit", async (event) => {{
                        event.preventDefault();
                        const res = await fetch("/upload", {{ method: "POST", body: new FormData(form) }});
                        const body = await res.json();
                        if (!res.ok) {{ status.textContent = body.error; return; }}
                        const poll = setInterval(async () => {{
                            const job = await (await fetch(`/progress/${{body.job_id}}`)).json();
                            status.textContent = `${{job.progress}}% ${{job.message}}`;
                            if (job.status === "done") {{
                                clearInterval(poll);
                                status.innerHTML = `<a href="/download/${{body.job_id}}">${{job.output_filename}}</a>`;
                            }} else if (job.status === "error") {{
                                clearInterval(poll);
                            }}
                        }}, 1000);
                    }});
                </script>
            </body>
        </html>
        "#,
        accept, models, qualities
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_stream_to_file() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("clip.mp4");

        type E = std::io::Error;
        let test_data = "not really a video";
        let mock_stream = stream::iter(vec![Ok::<Bytes, E>(Bytes::from(test_data))]);

        let result = stream_to_file(&file_path, mock_stream).await;

        assert!(result.is_ok());
        let file_contents = fs::read_to_string(file_path).unwrap();
        assert_eq!(file_contents, test_data);
    }

    #[tokio::test]
    async fn test_stream_to_file_error() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("clip.mp4");

        let mock_stream = stream::iter(vec![Err("Test error")]);

        let result = stream_to_file(&file_path, mock_stream).await;

        let err = result.unwrap_err();
        assert_eq!(err.0, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.1, "Test error");
    }

    #[test]
    fn test_secure_filename_keeps_last_component() {
        assert_eq!(secure_filename("../../etc/clip.mp4").as_deref(), Some("clip.mp4"));
        assert_eq!(secure_filename("C:\\videos\\my clip.mov").as_deref(), Some("my_clip.mov"));
        assert_eq!(secure_filename(".hidden.mp4").as_deref(), Some("hidden.mp4"));
        assert_eq!(secure_filename("../"), None);
    }

    #[test]
    fn test_allowed_extensions() {
        assert!(allowed_file("clip.MP4"));
        assert!(allowed_file("a.b.webm"));
        assert!(!allowed_file("song.mp3"));
        assert!(!allowed_file("mp4"));
    }

    #[test]
    fn test_form_values_fall_back_to_defaults() {
        assert_eq!(parse_model("mdx_extra_q"), ModelId::MdxExtraQ);
        assert_eq!(parse_model("spleeter"), ModelId::HtDemucs);
        assert_eq!(parse_quality(" 5 "), Quality::HIGH);
        assert_eq!(parse_quality("3"), Quality::FAST);
        assert_eq!(parse_quality("lots"), Quality::FAST);
    }
}
