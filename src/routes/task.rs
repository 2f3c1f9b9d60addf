use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        session::{GenerateRequest, HostRequest},
        task::{TaskCreatedResponse, TaskStatusResponse},
    },
    error::AppError,
    services::{generation_service, task_service},
    state::SharedState,
};

/// Routes creating background tasks and polling their status.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions/{code}/generate", post(start_generation))
        .route("/sessions/{code}/render", post(render_answer_sheet))
        .route("/sessions/{code}/narrate", post(narrate_question))
        .route("/tasks/{id}", get(get_task))
}

/// Kick off question generation for the session.
#[utoipa::path(
    post,
    path = "/sessions/{code}/generate",
    tag = "task",
    params(("code" = String, Path, description = "Join code of the session")),
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Generation task created", body = TaskCreatedResponse),
        (status = 409, description = "Play has already started")
    )
)]
pub async fn start_generation(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<GenerateRequest>,
) -> Result<Json<TaskCreatedResponse>, AppError> {
    let created = generation_service::start_generation(&state, &code, payload).await?;
    Ok(Json(created))
}

/// Render the session's answer sheet in the background.
#[utoipa::path(
    post,
    path = "/sessions/{code}/render",
    tag = "task",
    params(("code" = String, Path, description = "Join code of the session")),
    request_body = HostRequest,
    responses(
        (status = 200, description = "Render task created", body = TaskCreatedResponse)
    )
)]
pub async fn render_answer_sheet(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<HostRequest>,
) -> Result<Json<TaskCreatedResponse>, AppError> {
    let created = generation_service::start_render(&state, &code, payload).await?;
    Ok(Json(created))
}

/// Synthesize narration audio for the current question in the background.
#[utoipa::path(
    post,
    path = "/sessions/{code}/narrate",
    tag = "task",
    params(("code" = String, Path, description = "Join code of the session")),
    request_body = HostRequest,
    responses(
        (status = 200, description = "Narration task created", body = TaskCreatedResponse),
        (status = 404, description = "No question at the current position")
    )
)]
pub async fn narrate_question(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<HostRequest>,
) -> Result<Json<TaskCreatedResponse>, AppError> {
    let created = generation_service::start_narration(&state, &code, payload).await?;
    Ok(Json(created))
}

/// Poll a background task by id; works from any instance.
#[utoipa::path(
    get,
    path = "/tasks/{id}",
    tag = "task",
    params(("id" = Uuid, Path, description = "Identifier of the task")),
    responses(
        (status = 200, description = "Task status", body = TaskStatusResponse),
        (status = 404, description = "Unknown task")
    )
)]
pub async fn get_task(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskStatusResponse>, AppError> {
    let status = task_service::poll_task(&state, id).await?;
    Ok(Json(status))
}
