use std::{
    collections::{HashMap, HashSet},
    io::ErrorKind,
    path::{Path, PathBuf},
    pin::Pin,
    process::Stdio,
    sync::{Arc, LazyLock},
    task::{Context, Poll},
};

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Path as RoutePath, State},
    http::{
        HeaderMap, HeaderValue, Method, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use futures::Stream;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, BufReader},
    net::TcpListener,
    process::Command,
    sync::{Mutex, mpsc},
};
use tokio_util::io::ReaderStream;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
const DEFAULT_QUALITY: &str = "720";
const STREAM_CHUNK_SIZE: usize = 1024 * 1024;
const EXTRACTOR_HTTP_CHUNK_SIZE: u64 = 1024 * 1024;
const MAX_JOB_ID_LENGTH: usize = 64;
const PROGRESS_TTL_MINUTES: i64 = 30;
const STALE_ARTIFACT_SECONDS: u64 = 2 * 60 * 60;

// Machine-readable progress lines on the extractor's stdout. Fields mirror
// yt-dlp's human progress strings so they can be served back verbatim.
const PROGRESS_LINE_PREFIX: &str = "progress:";
const PROGRESS_TEMPLATE: &str =
    "progress:%(progress._percent_str)s|%(progress._speed_str)s|%(progress._eta_str)s";

// Prefix-anchored: optional scheme, optional "www", then one of the known
// YouTube URL forms.
static VIDEO_URL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^(https?://)?(www\.)?(youtube\.com|youtu\.be)/watch\?v=[\w-]+",
        r"^(https?://)?(www\.)?youtu\.be/[\w-]+",
        r"^(https?://)?(www\.)?youtube\.com/embed/[\w-]+",
        r"^(https?://)?(www\.)?youtube\.com/v/[\w-]+",
        r"^(https?://)?(www\.)?youtube\.com/playlist\?list=[\w-]+",
        r"^(https?://)?(www\.)?youtube\.com/shorts/[\w-]+",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("video URL pattern compiles"))
    .collect()
});

#[derive(Clone)]
struct AppState {
    progress: ProgressStore,
    artifacts_dir: PathBuf,
    extractor_bin: String,
}

#[derive(Debug, Deserialize)]
struct DownloadRequest {
    // Absent url is treated like an empty one so both report "URL is required".
    #[serde(default)]
    url: String,
    quality: Option<String>,
    video_id: Option<String>,
}

/// Last-observed download state for a job, overwritten on every report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ProgressSnapshot {
    percent: String,
    speed: String,
    eta: String,
}

#[derive(Debug, Clone)]
struct ProgressEntry {
    snapshot: ProgressSnapshot,
    updated_at: DateTime<Utc>,
}

/// Shared progress map, owned by the application state and handed to every
/// handler. The single mutex is held only for the duration of one read or
/// write.
#[derive(Clone, Default)]
struct ProgressStore {
    entries: Arc<Mutex<HashMap<String, ProgressEntry>>>,
}

impl ProgressStore {
    fn new() -> Self {
        Self::default()
    }

    /// Overwrites the snapshot for a job unconditionally, last-write-wins.
    /// Entries untouched for longer than the TTL are pruned on the way in so
    /// the map cannot grow without bound over the process lifetime.
    async fn record(&self, job_id: &str, snapshot: ProgressSnapshot) {
        let now = Utc::now();
        let mut entries = self.entries.lock().await;
        prune_progress_entries(&mut entries, now);
        entries.insert(
            job_id.to_string(),
            ProgressEntry {
                snapshot,
                updated_at: now,
            },
        );
    }

    async fn snapshot(&self, job_id: &str) -> Option<ProgressSnapshot> {
        self.entries
            .lock()
            .await
            .get(job_id)
            .map(|entry| entry.snapshot.clone())
    }
}

fn prune_progress_entries(entries: &mut HashMap<String, ProgressEntry>, now: DateTime<Utc>) {
    entries.retain(|_, entry| (now - entry.updated_at).num_minutes() < PROGRESS_TTL_MINUTES);
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
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

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "tubegate=info,tower_http=info".to_string()),
        )
        .init();

    if let Err(error) = run().await {
        eprintln!("Server error: {}", error.message);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ApiError> {
    let artifacts_dir = std::env::temp_dir().join("tubegate");
    tokio::fs::create_dir_all(&artifacts_dir)
        .await
        .map_err(|error| {
            ApiError::internal(format!("Could not create the artifact directory: {error}"))
        })?;

    cleanup_stale_artifacts(&artifacts_dir, STALE_ARTIFACT_SECONDS).await;

    let state = AppState {
        progress: ProgressStore::new(),
        artifacts_dir,
        extractor_bin: resolve_extractor_bin(),
    };

    let cors = build_cors_layer()?;

    let app = Router::new()
        .route("/", get(serve_frontend))
        .route("/health", get(health))
        .route("/download", post(download_video))
        .route("/progress/{video_id}", get(get_progress))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = resolve_bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|error| ApiError::internal(format!("Could not bind {addr}: {error}")))?;

    info!("Gateway listening on http://{addr}");

    axum::serve(listener, app)
        .await
        .map_err(|error| ApiError::internal(format!("HTTP server error: {error}")))
}

async fn serve_frontend() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn get_progress(
    State(state): State<AppState>,
    RoutePath(video_id): RoutePath<String>,
) -> Json<serde_json::Value> {
    match state.progress.snapshot(&video_id).await {
        Some(snapshot) => Json(serde_json::json!(snapshot)),
        None => Json(serde_json::json!({})),
    }
}

async fn download_video(
    State(state): State<AppState>,
    Json(payload): Json<DownloadRequest>,
) -> Result<Response, ApiError> {
    let url = payload.url.trim();
    if url.is_empty() {
        return Err(ApiError::bad_request("URL is required"));
    }
    if !is_supported_video_url(url) {
        return Err(ApiError::bad_request(
            "Invalid YouTube URL format. Supported formats:\n\
             - https://www.youtube.com/watch?v=VIDEO_ID\n\
             - https://youtu.be/VIDEO_ID\n\
             - https://www.youtube.com/embed/VIDEO_ID\n\
             - https://www.youtube.com/playlist?list=PLAYLIST_ID",
        ));
    }

    // Caller-supplied identifiers end up in filesystem paths, so anything
    // outside the safe charset is rejected rather than sanitized.
    let job_id = match payload.video_id.as_deref().and_then(non_empty) {
        Some(id) if is_valid_job_id(id) => id.to_string(),
        Some(_) => {
            return Err(ApiError::bad_request(
                "video_id may only contain letters, digits, '-' and '_'",
            ));
        }
        None => Uuid::new_v4().to_string(),
    };

    let quality = payload
        .quality
        .as_deref()
        .and_then(non_empty)
        .unwrap_or(DEFAULT_QUALITY);
    let format = format_expression(quality);

    info!("Starting extraction for job {job_id} ({quality})");

    // The extractor reports progress over a channel; a drain task applies the
    // updates to the shared store and ends once the sender side is dropped.
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let store = state.progress.clone();
    let progress_job_id = job_id.clone();
    tokio::spawn(async move {
        while let Some(snapshot) = progress_rx.recv().await {
            store.record(&progress_job_id, snapshot).await;
        }
    });

    let artifact_path = match run_extractor(&state, url, format, &job_id, progress_tx).await {
        Ok(path) => path,
        Err(error) => {
            cleanup_job_artifacts(&state.artifacts_dir, &job_id).await;
            return Err(error);
        }
    };

    match stream_artifact(artifact_path).await {
        Ok(response) => Ok(response),
        Err(error) => {
            cleanup_job_artifacts(&state.artifacts_dir, &job_id).await;
            Err(error)
        }
    }
}

/// Runs the extraction engine to completion and returns the path of the
/// downloaded artifact. Progress lines are forwarded as they arrive; the
/// final stdout line carries the artifact path printed by the extractor.
async fn run_extractor(
    state: &AppState,
    url: &str,
    format: &str,
    job_id: &str,
    progress_tx: mpsc::UnboundedSender<ProgressSnapshot>,
) -> Result<PathBuf, ApiError> {
    let output_template = state.artifacts_dir.join(format!("{job_id}.%(ext)s"));

    let mut command = Command::new(&state.extractor_bin);
    command
        .arg("--quiet")
        .arg("--no-warnings")
        .arg("--no-playlist")
        .arg("--progress")
        .arg("--newline")
        .arg("--progress-template")
        .arg(PROGRESS_TEMPLATE)
        .arg("--http-chunk-size")
        .arg(EXTRACTOR_HTTP_CHUNK_SIZE.to_string())
        .arg("--print")
        .arg("after_move:filepath")
        .arg("-f")
        .arg(format)
        .arg("-o")
        .arg(&output_template)
        .arg(url)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|error| {
        if error.kind() == ErrorKind::NotFound {
            ApiError::internal(
                "yt-dlp is not installed on the server. Install yt-dlp and restart the gateway.",
            )
        } else {
            ApiError::internal(format!("Could not start the extractor: {error}"))
        }
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ApiError::internal("Extractor stdout was not captured"))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| ApiError::internal("Extractor stderr was not captured"))?;

    let stderr_task = tokio::spawn(async move {
        let mut buffer = String::new();
        let _ = stderr.read_to_string(&mut buffer).await;
        buffer
    });

    let mut printed_path = None;
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(snapshot) = parse_progress_line(&line) {
                    let _ = progress_tx.send(snapshot);
                } else if !line.trim().is_empty() {
                    printed_path = Some(line.trim().to_string());
                }
            }
            Ok(None) => break,
            Err(error) => {
                warn!("Could not read extractor output: {error}");
                break;
            }
        }
    }

    let status = child
        .wait()
        .await
        .map_err(|error| ApiError::internal(format!("Could not wait for the extractor: {error}")))?;
    let stderr_output = stderr_task.await.unwrap_or_default();

    if !status.success() {
        return Err(extraction_error(&stderr_output));
    }

    resolve_artifact(&state.artifacts_dir, job_id, printed_path.as_deref()).await
}

/// Progress template lines look like `progress: 42.1%|  1.23MiB/s|00:42`.
fn parse_progress_line(line: &str) -> Option<ProgressSnapshot> {
    let rest = line.strip_prefix(PROGRESS_LINE_PREFIX)?;
    let mut fields = rest.splitn(3, '|');
    let percent = fields.next()?.trim();
    let speed = fields.next()?.trim();
    let eta = fields.next()?.trim();

    Some(ProgressSnapshot {
        percent: percent.to_string(),
        speed: speed.to_string(),
        eta: eta.to_string(),
    })
}

/// Maps an extractor failure to an API error. Failures the extractor itself
/// attributes to bad input surface as 400, everything else as 500. The final
/// stderr line carries the actual failure reason and is passed through.
fn extraction_error(stderr: &str) -> ApiError {
    let message = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .unwrap_or("The extractor could not complete the download")
        .to_string();
    let lower = message.to_ascii_lowercase();

    if lower.contains("unsupported url")
        || lower.contains("is not a valid url")
        || lower.contains("invalid url")
    {
        ApiError::bad_request(format!("YouTube download error: {message}"))
    } else {
        ApiError::internal(format!("YouTube download error: {message}"))
    }
}

/// Locates the downloaded artifact, preferring the path the extractor printed
/// and falling back to a scan for the job's filename prefix.
async fn resolve_artifact(
    dir: &Path,
    job_id: &str,
    printed_path: Option<&str>,
) -> Result<PathBuf, ApiError> {
    if let Some(path_value) = printed_path {
        if let Some(path) = artifact_candidate(dir, Path::new(path_value)).await {
            return Ok(path);
        }
    }

    let prefix = format!("{job_id}.");
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|error| {
        ApiError::internal(format!("Could not open the artifact directory: {error}"))
    })?;

    while let Some(entry) = entries.next_entry().await.map_err(|error| {
        ApiError::internal(format!("Could not scan the artifact directory: {error}"))
    })? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with(&prefix) && !name.ends_with(".part") {
            if let Some(path) = artifact_candidate(dir, &entry.path()).await {
                return Ok(path);
            }
        }
    }

    Err(ApiError::internal(
        "The downloaded file could not be located",
    ))
}

/// Accepts a candidate only if it is a regular file inside the artifact
/// directory once symlinks are resolved.
async fn artifact_candidate(dir: &Path, candidate: &Path) -> Option<PathBuf> {
    let metadata = tokio::fs::metadata(candidate).await.ok()?;
    if !metadata.is_file() {
        return None;
    }

    let canonical_dir = tokio::fs::canonicalize(dir).await.ok()?;
    let canonical = tokio::fs::canonicalize(candidate).await.ok()?;
    if canonical.starts_with(&canonical_dir) {
        Some(canonical)
    } else {
        warn!("Rejected artifact outside the artifact directory: {canonical:?}");
        None
    }
}

/// Builds the streaming response. From here on the artifact belongs to the
/// response body: it is deleted when the stream is dropped, whether the
/// transfer finished or the client went away.
async fn stream_artifact(path: PathBuf) -> Result<Response, ApiError> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(ToString::to_string)
        .unwrap_or_else(|| "download.mp4".to_string());

    let metadata = tokio::fs::metadata(&path).await.map_err(|error| {
        ApiError::internal(format!("Could not read the downloaded file: {error}"))
    })?;
    let file = tokio::fs::File::open(&path).await.map_err(|error| {
        ApiError::internal(format!("Could not open the downloaded file: {error}"))
    })?;

    let stream = ArtifactStream {
        inner: ReaderStream::with_capacity(file, STREAM_CHUNK_SIZE),
        _artifact: TempArtifact { path },
    };
    let body = Body::from_stream(stream);

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static(content_type_for_filename(&filename)),
    );
    headers.insert(
        CONTENT_LENGTH,
        HeaderValue::from_str(&metadata.len().to_string())
            .map_err(|_| ApiError::internal("Could not build the download size header"))?,
    );
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&build_content_disposition(&filename))
            .map_err(|_| ApiError::internal("Could not build the download header"))?,
    );

    Ok((headers, body).into_response())
}

/// Owns a downloaded artifact on disk. The file is removed exactly once, when
/// the owner drops; removal failures are swallowed.
struct TempArtifact {
    path: PathBuf,
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if let Err(error) = std::fs::remove_file(&self.path) {
            if error.kind() != ErrorKind::NotFound {
                debug!("Could not remove artifact {:?}: {error}", self.path);
            }
        }
    }
}

/// Chunked body over the downloaded file, holding the artifact's cleanup
/// guard for the lifetime of the transfer.
struct ArtifactStream {
    inner: ReaderStream<tokio::fs::File>,
    _artifact: TempArtifact,
}

impl Stream for ArtifactStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}

/// Removes every file the job left behind, including extractor intermediates
/// sharing the job's filename prefix. Best-effort on all paths.
async fn cleanup_job_artifacts(dir: &Path, job_id: &str) {
    let prefix = format!("{job_id}.");
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(error) => {
            if error.kind() != ErrorKind::NotFound {
                debug!("Could not open the artifact directory for cleanup: {error}");
            }
            return;
        }
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(&prefix) {
            continue;
        }
        if let Err(error) = tokio::fs::remove_file(entry.path()).await {
            if error.kind() != ErrorKind::NotFound {
                debug!("Could not remove artifact {:?}: {error}", entry.path());
            }
        }
    }
}

/// Sweeps artifacts left behind by earlier crashed processes.
async fn cleanup_stale_artifacts(dir: &Path, older_than_secs: u64) {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(error) => {
            if error.kind() != ErrorKind::NotFound {
                warn!("Could not open the artifact directory for the stale sweep: {error}");
            }
            return;
        }
    };

    let max_age = std::time::Duration::from_secs(older_than_secs);
    let now = std::time::SystemTime::now();

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }

        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age < max_age {
            continue;
        }

        if let Err(error) = tokio::fs::remove_file(&path).await {
            if error.kind() != ErrorKind::NotFound {
                warn!("Could not remove stale artifact {path:?}: {error}");
            }
        } else {
            info!("Removed stale artifact {path:?}");
        }
    }
}

fn is_supported_video_url(url: &str) -> bool {
    !url.is_empty()
        && VIDEO_URL_PATTERNS
            .iter()
            .any(|pattern| pattern.is_match(url))
}

/// Total mapping from a quality token to the extractor's format expression.
/// Unknown tokens degrade to the unrestricted best stream instead of failing.
fn format_expression(quality: &str) -> &'static str {
    match quality {
        "480" => "bestvideo[height<=480]+bestaudio/best[height<=480]",
        "720" => "bestvideo[height<=720]+bestaudio/best[height<=720]",
        "1080" => "bestvideo[height<=1080]+bestaudio/best[height<=1080]",
        _ => "best",
    }
}

fn is_valid_job_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_JOB_ID_LENGTH
        && value
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || matches!(character, '-' | '_'))
}

fn resolve_extractor_bin() -> String {
    std::env::var("YTDLP_BIN")
        .ok()
        .and_then(|value| non_empty(&value).map(ToString::to_string))
        .unwrap_or_else(|| "yt-dlp".to_string())
}

fn resolve_bind_addr() -> String {
    if let Some(configured) = std::env::var("APP_ADDR")
        .ok()
        .and_then(|value| non_empty(&value).map(ToString::to_string))
    {
        return configured;
    }

    if let Some(port) = std::env::var("PORT")
        .ok()
        .and_then(|value| value.trim().parse::<u16>().ok())
    {
        return format!("0.0.0.0:{port}");
    }

    DEFAULT_BIND_ADDR.to_string()
}

fn build_cors_layer() -> Result<CorsLayer, ApiError> {
    let configured = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    // Without an allowlist the gateway accepts any origin.
    if configured.is_empty() {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any));
    }

    let normalized = configured
        .iter()
        .map(|origin| {
            normalize_origin(origin).ok_or_else(|| {
                ApiError::internal(format!(
                    "Invalid origin in ALLOWED_ORIGINS: {origin}. Use values like https://example.com"
                ))
            })
        })
        .collect::<Result<HashSet<_>, _>>()?;
    let allowed = Arc::new(normalized);

    info!("CORS allow-list loaded with {} origin(s)", allowed.len());

    let allow_origin = AllowOrigin::predicate({
        let allowed = Arc::clone(&allowed);
        move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .ok()
                .and_then(normalize_origin)
                .is_some_and(|value| allowed.contains(&value))
        }
    });

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .expose_headers([CONTENT_DISPOSITION]))
}

fn normalize_origin(value: &str) -> Option<String> {
    let parsed = Url::parse(value).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let scheme = parsed.scheme();
    let default_port = match scheme {
        "http" => 80,
        "https" => 443,
        _ => return None,
    };

    if parsed.path() != "/" || parsed.query().is_some() || parsed.fragment().is_some() {
        return None;
    }

    match parsed.port() {
        Some(port) if port != default_port => Some(format!("{scheme}://{host}:{port}")),
        _ => Some(format!("{scheme}://{host}")),
    }
}

fn content_type_for_filename(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

fn build_content_disposition(filename: &str) -> String {
    let safe_ascii = sanitize_ascii_filename(filename);
    format!(
        "attachment; filename=\"{safe_ascii}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

fn sanitize_ascii_filename(value: &str) -> String {
    let mut sanitized = String::with_capacity(value.len());

    for character in value.chars() {
        if character.is_ascii_alphanumeric() || matches!(character, '.' | '-' | '_' | ' ') {
            sanitized.push(character);
        } else {
            sanitized.push('_');
        }
    }

    let compact = sanitized.trim();
    if compact.is_empty() {
        "download.mp4".to_string()
    } else {
        compact.to_string()
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}
