use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{
        AutoAdvanceEntity, GameVariant, GenerationProgressEntity, ParticipantEntity,
        SessionEntity, SessionStatus,
    },
    dto::format_system_time,
};

/// `(round, question)` pointer identifying what is currently active.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
pub struct PositionDto {
    /// Current round, 1-based.
    pub round: u32,
    /// Current question within the round, 1-based.
    pub question: u32,
}

/// Generation progress as exposed to clients.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct GenerationProgressDto {
    /// Completion percentage, 0 to 100.
    pub percent: u8,
    /// Human readable description of the current step.
    pub status_text: String,
}

impl From<GenerationProgressEntity> for GenerationProgressDto {
    fn from(progress: GenerationProgressEntity) -> Self {
        Self {
            percent: progress.percent,
            status_text: progress.status_text,
        }
    }
}

/// Auto-advance settings as exposed to clients.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct AutoAdvanceDto {
    /// Whether auto-advance is active.
    pub enabled: bool,
    /// Countdown length in seconds.
    pub seconds: u16,
    /// Whether the host paused auto-advance.
    pub paused: bool,
}

impl From<AutoAdvanceEntity> for AutoAdvanceDto {
    fn from(auto_advance: AutoAdvanceEntity) -> Self {
        Self {
            enabled: auto_advance.enabled,
            seconds: auto_advance.seconds,
            paused: auto_advance.paused,
        }
    }
}

/// Public projection of a session.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct SessionSnapshot {
    /// External-facing join code.
    pub code: String,
    /// Game flavour the session runs.
    pub variant: GameVariant,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Current position.
    pub position: PositionDto,
    /// When the countdown for the current question started, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_started_at: Option<String>,
    /// Progress of any in-flight generation work.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_progress: Option<GenerationProgressDto>,
    /// Auto-advance configuration.
    pub auto_advance: AutoAdvanceDto,
    /// Total rounds the session plays.
    pub total_rounds: u32,
    /// Questions per round.
    pub questions_per_round: u32,
}

impl From<SessionEntity> for SessionSnapshot {
    fn from(session: SessionEntity) -> Self {
        Self {
            code: session.code,
            variant: session.variant,
            status: session.status,
            position: PositionDto {
                round: session.current_round,
                question: session.current_question,
            },
            question_started_at: session.question_started_at.map(format_system_time),
            generation_progress: session.generation_progress.map(Into::into),
            auto_advance: session.auto_advance.into(),
            total_rounds: session.total_rounds,
            questions_per_round: session.questions_per_round,
        }
    }
}

/// Scoreboard entry for one participant.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct ParticipantSummary {
    /// Stable identifier for the participant.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Accumulated score.
    pub score: i32,
    /// Accumulated bonus points.
    pub bonus: i32,
}

impl From<ParticipantEntity> for ParticipantSummary {
    fn from(participant: ParticipantEntity) -> Self {
        Self {
            id: participant.id,
            name: participant.name,
            score: participant.score,
            bonus: participant.bonus,
        }
    }
}
