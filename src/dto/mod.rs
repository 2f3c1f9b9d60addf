//! Request, response, and stream payload types exposed over HTTP.

use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Shared projections used across responses.
pub mod common;
/// Health check payload.
pub mod health;
/// Session lifecycle and play payloads.
pub mod session;
/// Typed SSE event payloads and the event envelope.
pub mod sse;
/// Background task payloads.
pub mod task;
/// Validation helpers for request payloads.
pub mod validation;

pub(crate) fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
