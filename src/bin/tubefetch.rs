#![forbid(unsafe_code)]

//! HTTP front end for tubefetch.
//!
//! Two flavours of download live side by side: `/api/download` only resolves
//! a direct stream URL for the client to fetch itself, while `/download`
//! pulls the media onto this host in the background and exposes progress
//! through `/progress/{id}`. Finished files are listed and served from the
//! download directory.

use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Body,
    extract::{Path as AxumPath, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::Parser;
use mime_guess::MimeGuess;
use serde::{Deserialize, Serialize};
use tokio::{fs::File, signal};
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};

use tubefetch::config::{RuntimeConfig, RuntimeOverrides, resolve_runtime_config};
use tubefetch::downloads::{
    DirectLink, DownloadManager, JobSummary, ManagerSettings, StartedDownload,
};
use tubefetch::error::Error;
use tubefetch::extractor::YtDlpExtractor;
use tubefetch::files::{self, DownloadedFile};
use tubefetch::format::QualityTier;
use tubefetch::logging;
use tubefetch::progress::{CancelOutcome, ProgressState};
use tubefetch::security::{ensure_not_root, validate_source_url};

const SWEEP_INTERVAL_CAP: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
#[command(name = "tubefetch", version, about = "Video download service backed by yt-dlp")]
struct ServerArgs {
    /// Address to listen on (overrides TUBEFETCH_HOST).
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on (overrides TUBEFETCH_PORT).
    #[arg(long)]
    port: Option<u16>,
    /// Where background downloads are written (overrides DOWNLOAD_DIR).
    #[arg(long)]
    download_dir: Option<PathBuf>,
    /// Path to the yt-dlp executable (overrides YT_DLP_BIN).
    #[arg(long = "yt-dlp")]
    yt_dlp: Option<PathBuf>,
    /// Alternate .env file.
    #[arg(long)]
    env_file: Option<PathBuf>,
}

impl ServerArgs {
    fn into_overrides(self) -> RuntimeOverrides {
        RuntimeOverrides {
            host: self.host,
            port: self.port,
            download_dir: self.download_dir,
            yt_dlp_bin: self.yt_dlp,
            env_path: self.env_file,
        }
    }
}

fn parse_host_arg(value: &str) -> Result<IpAddr> {
    value
        .parse::<IpAddr>()
        .context("expected a valid IPv4 or IPv6 address for --host/TUBEFETCH_HOST")
}

#[derive(Clone)]
struct AppState {
    downloads: DownloadManager,
    allowed_hosts: Arc<Vec<String>>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            Error::Internal(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, "request failed: {}", self.message);
        } else {
            warn!(status = %self.status, "request rejected: {}", self.message);
        }
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
struct DownloadRequest {
    url: Option<String>,
    quality: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CancelRequest {
    #[serde(rename = "downloadId")]
    download_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct CancelResponse {
    success: bool,
    message: String,
}

#[derive(Debug, Serialize)]
struct FileListing {
    files: Vec<DownloadedFile>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init(logging::DEFAULT_FILTER);
    ensure_not_root("tubefetch")?;

    let config = resolve_runtime_config(ServerArgs::parse().into_overrides())?;
    let host = parse_host_arg(&config.host)?;
    let port = config.port;
    let download_dir = prepare_download_dir(&config)?;
    info!(dir = %download_dir.display(), "download directory ready");

    let extractor = Arc::new(YtDlpExtractor::new(config.yt_dlp_bin.clone()));
    let downloads = DownloadManager::new(
        extractor,
        ManagerSettings {
            download_dir,
            id_policy: config.id_policy,
            fetch_timeout: config.fetch_timeout,
            progress_ttl: config.progress_ttl,
        },
    );
    if let Some(ttl) = config.progress_ttl {
        spawn_eviction_sweep(downloads.clone(), ttl);
    }

    let state = AppState {
        downloads,
        allowed_hosts: Arc::new(config.allowed_hosts),
    };

    let addr = SocketAddr::new(host, port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    info!("listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running HTTP server")?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/download", post(start_download))
        .route("/api/download", post(direct_download))
        .route("/progress/{id}", get(get_progress))
        .route("/api/progress/{id}", get(get_progress))
        .route("/cancel_download", post(cancel_download))
        .route("/downloads", get(list_files))
        .route("/download_file/{name}", get(download_file))
        .route("/jobs", get(list_jobs))
        .with_state(state)
}

fn prepare_download_dir(config: &RuntimeConfig) -> Result<PathBuf> {
    match &config.download_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
            Ok(dir.clone())
        }
        None => Ok(tempfile::Builder::new()
            .prefix("tubefetch-")
            .tempdir()
            .context("creating temporary download directory")?
            .keep()),
    }
}

fn spawn_eviction_sweep(downloads: DownloadManager, ttl: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ttl.min(SWEEP_INTERVAL_CAP));
        loop {
            ticker.tick().await;
            let removed = downloads.evict_expired();
            if removed > 0 {
                info!(removed, "evicted expired progress entries");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("failed to install Ctrl+C handler: {}", err);
    }
    info!("shutting down");
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Unwraps a JSON body, turning axum's rejection into our error shape.
fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

fn validated_request(state: &AppState, request: &DownloadRequest) -> ApiResult<(String, QualityTier)> {
    let url = validate_source_url(request.url.as_deref(), &state.allowed_hosts)?;
    let tier = request
        .quality
        .as_deref()
        .map(QualityTier::parse)
        .unwrap_or(QualityTier::Highest);
    Ok((url.to_string(), tier))
}

async fn start_download(
    State(state): State<AppState>,
    payload: std::result::Result<Json<DownloadRequest>, JsonRejection>,
) -> ApiResult<Json<StartedDownload>> {
    let request = json_body(payload)?;
    let (url, tier) = validated_request(&state, &request)?;
    let started = state.downloads.start(&url, tier).await?;
    Ok(Json(started))
}

async fn direct_download(
    State(state): State<AppState>,
    payload: std::result::Result<Json<DownloadRequest>, JsonRejection>,
) -> ApiResult<Json<DirectLink>> {
    let request = json_body(payload)?;
    let (url, tier) = validated_request(&state, &request)?;
    let link = state.downloads.resolve_direct(&url, tier).await?;
    Ok(Json(link))
}

async fn get_progress(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Json<ProgressState> {
    Json(state.downloads.progress(&id))
}

async fn cancel_download(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CancelRequest>, JsonRejection>,
) -> ApiResult<Json<CancelResponse>> {
    let request = json_body(payload)?;
    let id = request
        .download_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::not_found("Download not found"))?;
    let message = match state.downloads.cancel(&id)? {
        CancelOutcome::Cancelled => "Download cancelled".to_string(),
        CancelOutcome::AlreadyTerminal(status) => format!("Download already {}", status.as_str()),
    };
    Ok(Json(CancelResponse {
        success: true,
        message,
    }))
}

async fn list_files(State(state): State<AppState>) -> ApiResult<Json<FileListing>> {
    let dir = state.downloads.download_dir().to_path_buf();
    let files = tokio::task::spawn_blocking(move || files::list_downloads(&dir))
        .await
        .map_err(|err| ApiError::internal(err.to_string()))??;
    Ok(Json(FileListing { files }))
}

async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobSummary>> {
    Json(state.downloads.jobs())
}

async fn download_file(
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
) -> ApiResult<Response> {
    let path = files::resolve_download(state.downloads.download_dir(), &name)?;
    let file = File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("File not found"))?;
    let size = file
        .metadata()
        .await
        .map_err(|_| ApiError::not_found("File not found"))?
        .len();

    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    if let Some(mime) = MimeGuess::from_path(&path).first()
        && let Ok(value) = HeaderValue::from_str(mime.as_ref())
    {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&attachment_disposition(&name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

/// `Content-Disposition` with an ASCII fallback name plus the RFC 5987
/// encoded name.
fn attachment_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || b"-._~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}
