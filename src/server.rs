//! HTTP surface for the pipeline: submit, poll, fetch artifact, cancel.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{error::ScenecastError, model::RenderRequest, orchestrator::Orchestrator};

pub fn build_router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/render", post(submit))
        .route("/jobs/:id", get(status).delete(cancel))
        .route("/jobs/:id/artifact", get(artifact))
        .with_state(orchestrator)
}

struct ApiError(ScenecastError);

impl From<ScenecastError> for ApiError {
    fn from(err: ScenecastError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ScenecastError::Validation(_) => StatusCode::BAD_REQUEST,
            ScenecastError::NotFound(_) => StatusCode::NOT_FOUND,
            ScenecastError::NotReady(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

#[derive(serde::Serialize)]
struct SubmitResponse {
    job_id: Uuid,
}

async fn submit(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(request): Json<RenderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id = orchestrator.submit(request).await?;
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { job_id })))
}

async fn status(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = orchestrator.get_status(id).await?;
    Ok(Json(snapshot))
}

#[derive(serde::Serialize)]
struct CancelResponse {
    accepted: bool,
}

async fn cancel(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let accepted = orchestrator.cancel(id).await?;
    Ok(Json(CancelResponse { accepted }))
}

async fn artifact(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let path = orchestrator.get_artifact(id).await?;
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        ApiError(ScenecastError::not_found(format!(
            "artifact for job {id}: {e}"
        )))
    })?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{id}.mp4"));
    Ok((
        [
            (header::CONTENT_TYPE, "video/mp4".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    ))
}
