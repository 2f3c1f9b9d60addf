use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Pub Quiz Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::create_session,
        crate::routes::session::get_session,
        crate::routes::session::delete_session,
        crate::routes::session::join_session,
        crate::routes::session::list_participants,
        crate::routes::session::transition_session,
        crate::routes::session::advance_session,
        crate::routes::session::start_countdown,
        crate::routes::session::set_auto_advance,
        crate::routes::play::claim_buzz,
        crate::routes::play::submit_answer,
        crate::routes::play::grade_answer,
        crate::routes::task::start_generation,
        crate::routes::task::render_answer_sheet,
        crate::routes::task::narrate_question,
        crate::routes::task::get_task,
        crate::routes::stream::participant_stream,
        crate::routes::stream::host_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::common::SessionSnapshot,
            crate::dto::common::ParticipantSummary,
            crate::dto::session::CreateSessionRequest,
            crate::dto::session::CreateSessionResponse,
            crate::dto::session::JoinSessionRequest,
            crate::dto::session::JoinSessionResponse,
            crate::dto::session::ParticipantsResponse,
            crate::dto::session::TransitionRequest,
            crate::dto::session::HostRequest,
            crate::dto::session::AutoAdvanceRequest,
            crate::dto::session::BuzzRequest,
            crate::dto::session::BuzzResponse,
            crate::dto::session::SubmitAnswerRequest,
            crate::dto::session::GradeAnswerRequest,
            crate::dto::session::GenerateRequest,
            crate::dto::task::TaskCreatedResponse,
            crate::dto::task::TaskStatusResponse,
            crate::dao::models::GameVariant,
            crate::dao::models::SessionStatus,
            crate::dao::models::TaskKind,
            crate::dao::models::TaskStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "session", description = "Session lifecycle operations"),
        (name = "play", description = "In-game participant and grading operations"),
        (name = "task", description = "Background task creation and polling"),
        (name = "stream", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
