use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dao::models::SessionStatus,
    dto::common::{GenerationProgressDto, PositionDto},
};

#[derive(Clone, Debug, PartialEq, Eq)]
/// Dispatched payload carried on an SSE connection.
pub struct ServerEvent {
    /// SSE event name; `None` produces an unnamed data event.
    pub event: Option<String>,
    /// Serialized JSON data field.
    pub data: String,
}

impl ServerEvent {
    /// Build a plain event from pre-rendered data.
    pub fn new(event: impl Into<Option<String>>, data: String) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<T>(event: &str, payload: &T) -> serde_json::Result<Self>
    where
        T: Serialize,
    {
        Ok(Self {
            event: Some(event.to_string()),
            data: serde_json::to_string(payload)?,
        })
    }

    /// Blank-payload heartbeat emitted every poll tick; rendered as an SSE
    /// comment so clients never see it as data.
    pub fn heartbeat() -> Self {
        Self {
            event: None,
            data: String::new(),
        }
    }

    /// Whether this is a per-tick heartbeat rather than a data event.
    pub fn is_heartbeat(&self) -> bool {
        self.event.is_none() && self.data.is_empty()
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to a stream client when it connects.
pub struct ConnectedEvent {
    /// Join code of the observed session.
    pub code: String,
    /// Role of the stream (`participant` or `host`).
    pub role: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted when the session status changes.
pub struct StatusEvent {
    /// New lifecycle status.
    pub status: SessionStatus,
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted when the `(round, question)` position changes.
pub struct PositionEvent {
    /// New position.
    #[serde(flatten)]
    pub position: PositionDto,
    /// Countdown start for the new position, when one is running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_started_at: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Emitted whenever background generation progress moves.
pub struct GenerationProgressEvent(pub GenerationProgressDto);

#[derive(Debug, Serialize, ToSchema)]
/// Emitted when the number of submitted answers for the current question changes.
pub struct AnswerCountEvent {
    /// Round the count refers to.
    pub round: u32,
    /// Question the count refers to.
    pub question: u32,
    /// Number of submitted answers.
    pub answers: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted when the participant roster size changes.
pub struct ParticipantCountEvent {
    /// Number of participants in the session.
    pub participants: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted once generation progress reaches 100; the stream closes afterwards.
pub struct GenerationCompleteEvent {
    /// Human-readable completion note.
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted when the connection hits its hard lifetime ceiling.
pub struct TimeoutEvent {
    /// Hint telling the client to reconnect.
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted when the session reaches its terminal status; the stream closes.
pub struct EndedEvent {
    /// Final status, always the terminal one.
    pub status: SessionStatus,
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted when the stream loop hits an unrecoverable error; the stream closes.
pub struct ErrorEvent {
    /// Description of the failure.
    pub message: String,
}
