use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, Query, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use serde::Deserialize;
use tracing::info;

use crate::{
    error::AppError,
    services::{
        session_service,
        stream_service::{self, StreamRole},
    },
    state::SharedState,
};

/// Query carrying the host credential for the host stream. `EventSource`
/// cannot set headers, so the token travels as a query parameter.
#[derive(Debug, Deserialize)]
pub struct HostStreamQuery {
    /// Host credential.
    pub host_token: String,
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sessions/{code}/stream", get(participant_stream))
        .route("/sessions/{code}/stream/host", get(host_stream))
}

#[utoipa::path(
    get,
    path = "/sessions/{code}/stream",
    tag = "stream",
    params(("code" = String, Path, description = "Join code of the session")),
    responses((status = 200, description = "Participant SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream session changes to participants and projection screens.
pub async fn participant_stream(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    // Unknown codes fail the request up front instead of in-band.
    session_service::resolve_session(&state, &code).await?;
    info!(%code, "new participant stream connection");
    let stream = stream_service::event_stream(
        state.store(),
        state.config().stream,
        code,
        StreamRole::Participant,
    );
    Ok(stream_service::to_sse(stream, state.config().stream.keepalive))
}

#[utoipa::path(
    get,
    path = "/sessions/{code}/stream/host",
    tag = "stream",
    params(
        ("code" = String, Path, description = "Join code of the session"),
        ("host_token" = String, Query, description = "Host credential")
    ),
    responses((status = 200, description = "Host SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream session changes plus answer counts to the host console.
pub async fn host_stream(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Query(query): Query<HostStreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let session = session_service::resolve_session(&state, &code).await?;
    session_service::require_host(&session, &query.host_token)?;
    info!(%code, "new host stream connection");
    let stream = stream_service::event_stream(
        state.store(),
        state.config().stream,
        code,
        StreamRole::Host,
    );
    Ok(stream_service::to_sse(stream, state.config().stream.keepalive))
}
