use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

/// Mount point of the interactive API explorer.
const SWAGGER_PATH: &str = "/docs";
/// Where the generated OpenAPI document for the quiz backend is served.
const OPENAPI_PATH: &str = "/api-docs/pubquiz.json";

/// Serve the generated OpenAPI document and its Swagger UI.
pub fn router(state: SharedState) -> Router<SharedState> {
    let ui: Router<SharedState> = SwaggerUi::new(SWAGGER_PATH)
        .url(OPENAPI_PATH, ApiDoc::openapi())
        .into();

    ui.with_state(state)
}
