use crate::config::Config;
use crate::display::render_display_frame;
use crate::error::AppError;
use crate::filters::StepTiming;
use crate::session::{Refresh, Session};
use crate::source::ImageSource;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::header,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower_http::trace::TraceLayer;

const INDEX_HTML: &str = include_str!("ui/index.html");

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<Session>>,
    pub config: Arc<Config>,
}

/// Snapshot of the session after an action
#[derive(Serialize)]
pub struct SessionResponse {
    pub loaded: bool,
    pub source: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub denoise_strength: f32,
    pub sharpen_strength: f32,
    pub denoise_label: String,
    pub sharpen_label: String,
    pub refresh: Refresh,
    pub processing_time_ms: u64,
    pub steps: Vec<StepTiming>,
}

impl SessionResponse {
    fn snapshot(session: &Session, refresh: Refresh) -> Self {
        let params = session.params();
        let run = session.last_run().cloned().unwrap_or_default();
        Self {
            loaded: session.is_loaded(),
            source: session.source().map(str::to_string),
            width: session.original().map(|img| img.width()),
            height: session.original().map(|img| img.height()),
            denoise_strength: params.denoise(),
            sharpen_strength: params.sharpen(),
            denoise_label: params.denoise_label(),
            sharpen_label: params.sharpen_label(),
            refresh,
            processing_time_ms: run.total_time_ms,
            steps: run.steps,
        }
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct SaveResponse {
    pub path: String,
}

#[derive(Deserialize)]
pub struct PathRequest {
    pub path: String,
}

#[derive(Deserialize)]
pub struct UrlRequest {
    pub url: String,
}

#[derive(Deserialize)]
pub struct StrengthRequest {
    pub value: f32,
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState {
        session: Arc::new(Mutex::new(Session::new())),
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, router(state)).await?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    let max_file_size = state.config.max_file_size;

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/state", get(handle_state))
        .route("/open", post(handle_open))
        .route("/open/path", post(handle_open_path))
        .route("/open/url", post(handle_open_url))
        .route("/denoise", post(handle_denoise))
        .route("/sharpen", post(handle_sharpen))
        .route("/revert", post(handle_revert))
        .route("/save", post(handle_save))
        .route("/preview/:pane", get(handle_preview))
        .layer(DefaultBodyLimit::max(max_file_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run one action against the session on the blocking pool
///
/// The session lock is held for the whole action, so actions never overlap.
async fn with_session<T, F>(state: &AppState, action: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&mut Session, &Config) -> Result<T, AppError> + Send + 'static,
{
    let session = Arc::clone(&state.session);
    let config = Arc::clone(&state.config);

    tokio::task::spawn_blocking(move || {
        let mut guard = session
            .lock()
            .map_err(|_| AppError::Internal("session lock poisoned".to_string()))?;
        action(&mut guard, &config)
    })
    .await
    .map_err(|e| AppError::Internal(format!("session task failed: {}", e)))?
}

async fn load_source(
    state: &AppState,
    source: ImageSource,
) -> Result<Json<SessionResponse>, AppError> {
    with_session(state, move |session, config| {
        let refresh = session.load(&source, config.max_file_size as u64)?;
        Ok(Json(SessionResponse::snapshot(session, refresh)))
    })
    .await
}

async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_state(State(state): State<AppState>) -> Result<Json<SessionResponse>, AppError> {
    with_session(&state, |session, _| {
        Ok(Json(SessionResponse::snapshot(session, Refresh::Nothing)))
    })
    .await
}

/// Handle browser uploads
async fn handle_open(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SessionResponse>, AppError> {
    let mut upload: Option<ImageSource> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(format!("Failed to parse multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let name = field.file_name().unwrap_or("upload").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidRequest(format!("Failed to read file data: {}", e)))?;
        upload = Some(ImageSource::Bytes {
            name,
            data: data.to_vec(),
        });
    }

    let source =
        upload.ok_or_else(|| AppError::InvalidRequest("Missing file in request".to_string()))?;
    load_source(&state, source).await
}

async fn handle_open_path(
    State(state): State<AppState>,
    Json(request): Json<PathRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    load_source(&state, ImageSource::Path(PathBuf::from(request.path))).await
}

async fn handle_open_url(
    State(state): State<AppState>,
    Json(request): Json<UrlRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let url = request.url.trim().to_string();
    if url.is_empty() {
        return Err(AppError::InvalidRequest("Missing URL".to_string()));
    }
    load_source(&state, ImageSource::Url(url)).await
}

async fn handle_denoise(
    State(state): State<AppState>,
    Json(request): Json<StrengthRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    with_session(&state, move |session, _| {
        let refresh = session.set_denoise_strength(request.value);
        Ok(Json(SessionResponse::snapshot(session, refresh)))
    })
    .await
}

async fn handle_sharpen(
    State(state): State<AppState>,
    Json(request): Json<StrengthRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    with_session(&state, move |session, _| {
        let refresh = session.set_sharpen_strength(request.value);
        Ok(Json(SessionResponse::snapshot(session, refresh)))
    })
    .await
}

async fn handle_revert(State(state): State<AppState>) -> Result<Json<SessionResponse>, AppError> {
    with_session(&state, |session, _| {
        let refresh = session.revert();
        Ok(Json(SessionResponse::snapshot(session, refresh)))
    })
    .await
}

async fn handle_save(
    State(state): State<AppState>,
    Json(request): Json<PathRequest>,
) -> Result<Json<SaveResponse>, AppError> {
    let requested = request.path.trim().to_string();
    if requested.is_empty() {
        return Err(AppError::InvalidRequest("Missing path".to_string()));
    }

    with_session(&state, move |session, config| {
        let destination = config.resolve_output(std::path::Path::new(&requested));
        let path = session.save_processed(&destination)?;
        Ok(Json(SaveResponse {
            path: path.display().to_string(),
        }))
    })
    .await
}

/// Serve one preview pane as a PNG display frame
async fn handle_preview(
    State(state): State<AppState>,
    Path(pane): Path<String>,
) -> Result<Response, AppError> {
    let edited = match pane.as_str() {
        "original.png" => false,
        "edited.png" => true,
        other => {
            return Err(AppError::InvalidRequest(format!("Unknown pane: {}", other)));
        }
    };

    let png = with_session(&state, move |session, config| {
        let image = if edited {
            session.processed()
        } else {
            session.original()
        }
        .ok_or(AppError::NotLoaded)?;

        let frame = render_display_frame(image, config.frame_width, config.frame_height);
        let mut buffer = Vec::new();
        frame
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| AppError::Internal(format!("Failed to encode preview: {}", e)))?;
        Ok(buffer)
    })
    .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        png,
    )
        .into_response())
}
