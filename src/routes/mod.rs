use axum::Router;

use crate::state::SharedState;

/// Swagger UI and OpenAPI document routes.
pub mod docs;
/// Health check route.
pub mod health;
/// Buzzing, answering, and grading routes.
pub mod play;
/// Session lifecycle routes.
pub mod session;
/// SSE stream routes.
pub mod stream;
/// Background task routes.
pub mod task;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(session::router())
        .merge(play::router())
        .merge(task::router())
        .merge(stream::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
