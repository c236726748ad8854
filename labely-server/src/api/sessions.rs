//! Labeling session endpoints (`/session/*`)

use axum::{
    extract::{Path, State},
    Json,
};
use labely_common::api::{StartSessionRequest, SubmitLabelRequest};
use labely_common::models::{ScoreResult, Session, TaskView};
use uuid::Uuid;

use crate::error::Result;
use crate::AppState;

/// POST /session/start
///
/// Resumes the caller's open session on the dataset when there is one.
pub async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> Result<Json<Session>> {
    let session = state
        .engine
        .start_session(&request.user_id, &request.dataset, request.task_limit)
        .await?;
    Ok(Json(session))
}

/// GET /session/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Session>> {
    Ok(Json(state.engine.get_session(session_id).await?))
}

/// GET /session/:id/next
pub async fn next_task(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<TaskView>> {
    Ok(Json(state.engine.next_task(session_id).await?))
}

/// POST /session/:id/submit
pub async fn submit_label(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SubmitLabelRequest>,
) -> Result<Json<ScoreResult>> {
    let result = state
        .engine
        .submit_label(session_id, request.item_id, request.label)
        .await?;
    Ok(Json(result))
}
