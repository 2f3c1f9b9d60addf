/// Buzzer claims, answers, and grading.
pub mod buzz_service;
/// External collaborator contracts and built-in implementations.
pub mod collaborators;
/// OpenAPI documentation generation.
pub mod documentation;
/// Background executors for generation, rendering, and narration.
pub mod generation_service;
/// Health check service.
pub mod health_service;
/// Session lifecycle and advancement logic.
pub mod session_service;
/// Change-detection SSE broadcasting.
pub mod stream_service;
/// Durable task registry operations.
pub mod task_service;
