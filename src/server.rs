//! HTTP boundary.
//!
//! Each route turns a request into one workflow intent and answers with the
//! resulting snapshot. The page at `/` renders whatever comes back.

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::encoder::{self, SelectedFile};
use crate::error::WorkflowError;
use crate::ui;
use crate::workflow::{Snapshot, WorkflowHandle};

/// Largest accepted upload body. Axum's default of 2 MiB is too small for
/// phone photos.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Multipart field carrying the picked file.
pub const FILE_FIELD: &str = "file";

pub fn router(workflow: WorkflowHandle) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/state", get(state))
        .route("/api/upload", post(upload))
        .route("/api/analyze", post(analyze))
        .route("/api/retry", post(retry))
        .route("/api/reset", post(reset))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(workflow)
}

#[derive(Debug)]
pub enum ApiError {
    Rejected(WorkflowError),
    BadUpload(MultipartError),
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        Self::Rejected(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::BadUpload(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Rejected(WorkflowError::Closed) => {
                (StatusCode::SERVICE_UNAVAILABLE, WorkflowError::Closed.to_string())
            }
            Self::Rejected(err) => (StatusCode::CONFLICT, err.to_string()),
            Self::BadUpload(err) => (err.status(), err.body_text()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

async fn index() -> Html<&'static str> {
    Html(ui::INDEX_HTML)
}

#[derive(Debug, Default, Deserialize)]
struct StateQuery {
    /// Leave the image out; the page polls with this while loading.
    #[serde(default)]
    lite: bool,
}

async fn state(
    State(workflow): State<WorkflowHandle>,
    Query(query): Query<StateQuery>,
) -> Json<Snapshot> {
    let snapshot = workflow.snapshot();
    Json(if query.lite { snapshot.without_image() } else { snapshot })
}

async fn upload(
    State(workflow): State<WorkflowHandle>,
    mut multipart: Multipart,
) -> Result<Json<Snapshot>, ApiError> {
    let mut selected = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;

        // A form submitted with no file selected still sends an empty part.
        if name.is_empty() && bytes.is_empty() {
            continue;
        }
        selected = Some(SelectedFile::new(name, content_type, bytes.to_vec()));
        break;
    }

    let asset = encoder::encode(selected);
    Ok(Json(workflow.upload(asset).await?))
}

async fn analyze(State(workflow): State<WorkflowHandle>) -> Result<Json<Snapshot>, ApiError> {
    Ok(Json(workflow.analyze().await?))
}

async fn retry(State(workflow): State<WorkflowHandle>) -> Result<Json<Snapshot>, ApiError> {
    Ok(Json(workflow.retry().await?))
}

async fn reset(State(workflow): State<WorkflowHandle>) -> Result<Json<Snapshot>, ApiError> {
    Ok(Json(workflow.reset().await?))
}
