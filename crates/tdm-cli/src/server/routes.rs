//! Route handlers: submit, cancel, status and artifact retrieval.

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tdm_core::status::TaskView;
use tdm_core::url_model::attachment_header;
use tdm_core::TaskId;
use tokio_util::io::ReaderStream;

use super::error::ApiError;
use super::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBody {
    #[serde(default)]
    magnet_link: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    success: bool,
    task_id: String,
    message: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBody {
    #[serde(default)]
    task_id: Option<Value>,
}

/// POST /api/download
pub async fn submit(
    State(state): State<AppState>,
    body: Result<Json<SubmitBody>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let locator = match body.magnet_link {
        Some(Value::String(s)) => s,
        _ => String::new(),
    };
    let id = state.scheduler.submit(&locator)?;
    Ok(Json(SubmitResponse {
        success: true,
        task_id: id.to_string(),
        message: "Download queued",
    }))
}

/// DELETE /api/download. Unknown ids succeed.
pub async fn cancel(
    State(state): State<AppState>,
    body: Result<Json<CancelBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let id = parse_task_id(body.task_id.as_ref())?;
    state.scheduler.cancel(id);
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Accepts the id as a JSON string (as `/api/status` reports it) or number.
fn parse_task_id(value: Option<&Value>) -> Result<TaskId, ApiError> {
    match value {
        None | Some(Value::Null) => Err(ApiError::bad_request("missing taskId")),
        Some(Value::String(s)) if s.trim().is_empty() => Err(ApiError::bad_request("missing taskId")),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| ApiError::bad_request("invalid taskId")),
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| ApiError::bad_request("invalid taskId")),
        Some(_) => Err(ApiError::bad_request("invalid taskId")),
    }
}

/// GET /api/status
pub async fn status(State(state): State<AppState>) -> Json<Vec<TaskView>> {
    Json(state.scheduler.snapshot())
}

/// GET /api/files/{filename}
pub async fn retrieve(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let artifact = state.store.open_artifact(&filename).await?;
    tracing::debug!(name = %artifact.name, size = artifact.size, "serving artifact");
    let body = Body::from_stream(ReaderStream::new(artifact.file));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, artifact.size.to_string()),
            (header::CONTENT_DISPOSITION, attachment_header(&artifact.name)),
        ],
        body,
    )
        .into_response())
}
