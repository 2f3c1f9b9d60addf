use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};

use crate::{
    dto::{
        common::SessionSnapshot,
        session::{
            AutoAdvanceRequest, CreateSessionRequest, CreateSessionResponse, HostRequest,
            JoinSessionRequest, JoinSessionResponse, ParticipantsResponse, TransitionRequest,
        },
    },
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Routes handling the session lifecycle: creation, joining, transitions,
/// and advancement.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{code}", get(get_session).delete(delete_session))
        .route("/sessions/{code}/join", post(join_session))
        .route("/sessions/{code}/participants", get(list_participants))
        .route("/sessions/{code}/transition", post(transition_session))
        .route("/sessions/{code}/advance", post(advance_session))
        .route("/sessions/{code}/countdown", post(start_countdown))
        .route("/sessions/{code}/auto-advance", put(set_auto_advance))
}

/// Create a fresh session and hand back the host credential.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "session",
    request_body = CreateSessionRequest,
    responses(
        (status = 200, description = "Session created", body = CreateSessionResponse)
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, AppError> {
    let created = session_service::create_session(&state, payload).await?;
    Ok(Json(created))
}

/// Public snapshot of a session.
#[utoipa::path(
    get,
    path = "/sessions/{code}",
    tag = "session",
    params(("code" = String, Path, description = "Join code of the session")),
    responses(
        (status = 200, description = "Session snapshot", body = SessionSnapshot)
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let snapshot = session_service::get_session(&state, &code).await?;
    Ok(Json(snapshot))
}

/// Tear a session down, cascading to everything it owns.
#[utoipa::path(
    delete,
    path = "/sessions/{code}",
    tag = "session",
    params(("code" = String, Path, description = "Join code of the session")),
    request_body = HostRequest,
    responses(
        (status = 200, description = "Session deleted"),
        (status = 401, description = "Host credential required")
    )
)]
pub async fn delete_session(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<HostRequest>,
) -> Result<(), AppError> {
    session_service::delete(&state, &code, &payload.host_token).await?;
    Ok(())
}

/// Register a participant and mint their bearer token.
#[utoipa::path(
    post,
    path = "/sessions/{code}/join",
    tag = "session",
    params(("code" = String, Path, description = "Join code of the session")),
    request_body = JoinSessionRequest,
    responses(
        (status = 200, description = "Participant joined", body = JoinSessionResponse)
    )
)]
pub async fn join_session(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<JoinSessionRequest>,
) -> Result<Json<JoinSessionResponse>, AppError> {
    let joined = session_service::join_session(&state, &code, payload).await?;
    Ok(Json(joined))
}

/// Scoreboard roster of the session.
#[utoipa::path(
    get,
    path = "/sessions/{code}/participants",
    tag = "session",
    params(("code" = String, Path, description = "Join code of the session")),
    responses(
        (status = 200, description = "Participant roster", body = ParticipantsResponse)
    )
)]
pub async fn list_participants(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<ParticipantsResponse>, AppError> {
    let roster = session_service::list_participants(&state, &code).await?;
    Ok(Json(roster))
}

/// Apply an explicit status transition requested by the host.
#[utoipa::path(
    post,
    path = "/sessions/{code}/transition",
    tag = "session",
    params(("code" = String, Path, description = "Join code of the session")),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Status applied", body = SessionSnapshot),
        (status = 409, description = "Transition not allowed from the current status")
    )
)]
pub async fn transition_session(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<TransitionRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let snapshot = session_service::transition(&state, &code, payload).await?;
    Ok(Json(snapshot))
}

/// Move the session to the next question, round, or halftime.
#[utoipa::path(
    post,
    path = "/sessions/{code}/advance",
    tag = "session",
    params(("code" = String, Path, description = "Join code of the session")),
    request_body = HostRequest,
    responses(
        (status = 200, description = "Position advanced", body = SessionSnapshot),
        (status = 409, description = "Session is not advanceable")
    )
)]
pub async fn advance_session(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<HostRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let snapshot = session_service::advance(&state, &code, &payload.host_token).await?;
    Ok(Json(snapshot))
}

/// Stamp the countdown start for the current question.
#[utoipa::path(
    post,
    path = "/sessions/{code}/countdown",
    tag = "session",
    params(("code" = String, Path, description = "Join code of the session")),
    request_body = HostRequest,
    responses(
        (status = 200, description = "Countdown started", body = SessionSnapshot)
    )
)]
pub async fn start_countdown(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<HostRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let snapshot = session_service::start_countdown(&state, &code, &payload.host_token).await?;
    Ok(Json(snapshot))
}

/// Replace the auto-advance settings.
#[utoipa::path(
    put,
    path = "/sessions/{code}/auto-advance",
    tag = "session",
    params(("code" = String, Path, description = "Join code of the session")),
    request_body = AutoAdvanceRequest,
    responses(
        (status = 200, description = "Settings stored", body = SessionSnapshot)
    )
)]
pub async fn set_auto_advance(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<AutoAdvanceRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let snapshot = session_service::set_auto_advance(&state, &code, payload).await?;
    Ok(Json(snapshot))
}
