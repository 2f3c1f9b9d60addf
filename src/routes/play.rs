use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};

use crate::{
    dto::{
        common::ParticipantSummary,
        session::{BuzzRequest, BuzzResponse, GradeAnswerRequest, SubmitAnswerRequest},
    },
    error::AppError,
    services::buzz_service,
    state::SharedState,
};

/// Routes used while a question is live: buzzing, answering, grading.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions/{code}/buzz", post(claim_buzz))
        .route("/sessions/{code}/answers", post(submit_answer))
        .route("/sessions/{code}/answers/grade", post(grade_answer))
}

/// Claim a buzz rank on the current question.
#[utoipa::path(
    post,
    path = "/sessions/{code}/buzz",
    tag = "play",
    params(("code" = String, Path, description = "Join code of the session")),
    request_body = BuzzRequest,
    responses(
        (status = 200, description = "Rank assigned or re-read", body = BuzzResponse),
        (status = 409, description = "Session is not in progress")
    )
)]
pub async fn claim_buzz(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<BuzzRequest>,
) -> Result<Json<BuzzResponse>, AppError> {
    let claim = buzz_service::claim_buzz(&state, &code, payload).await?;
    Ok(Json(claim))
}

/// Submit an answer to the current question.
#[utoipa::path(
    post,
    path = "/sessions/{code}/answers",
    tag = "play",
    params(("code" = String, Path, description = "Join code of the session")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer recorded"),
        (status = 409, description = "Already answered or session not in progress")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<(), AppError> {
    buzz_service::submit_answer(&state, &code, payload).await?;
    Ok(())
}

/// Host grades one participant's answer and applies the score delta.
#[utoipa::path(
    post,
    path = "/sessions/{code}/answers/grade",
    tag = "play",
    params(("code" = String, Path, description = "Join code of the session")),
    request_body = GradeAnswerRequest,
    responses(
        (status = 200, description = "Answer graded", body = ParticipantSummary)
    )
)]
pub async fn grade_answer(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<GradeAnswerRequest>,
) -> Result<Json<ParticipantSummary>, AppError> {
    let summary = buzz_service::grade_answer(&state, &code, payload).await?;
    Ok(Json(summary))
}
