use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::{GameVariant, SessionStatus},
    dto::{
        common::{ParticipantSummary, SessionSnapshot},
        validation::validate_display_name,
    },
};

/// Payload used to set up a brand-new session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateSessionRequest {
    /// Which game flavour to run.
    pub variant: GameVariant,
    /// Number of rounds; ignored for the lobby variant.
    #[validate(range(min = 1, max = 20))]
    #[serde(default = "default_rounds")]
    pub total_rounds: u32,
    /// Questions per round; ignored for the lobby variant.
    #[validate(range(min = 1, max = 50))]
    #[serde(default = "default_questions")]
    pub questions_per_round: u32,
    /// Rounds that should be preceded by a halftime pause.
    #[serde(default)]
    pub halftime_before_rounds: Vec<u32>,
}

fn default_rounds() -> u32 {
    2
}

fn default_questions() -> u32 {
    10
}

/// Response to session creation, carrying the host credential exactly once.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateSessionResponse {
    /// Public projection of the new session.
    pub session: SessionSnapshot,
    /// Bearer credential for host-only operations; not retrievable later.
    pub host_token: String,
}

/// Payload for a participant joining a session.
#[derive(Debug, Deserialize, ToSchema)]
pub struct JoinSessionRequest {
    /// Display name, unique within the session.
    pub name: String,
}

impl Validate for JoinSessionRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(err) = validate_display_name(&self.name) {
            errors.add("name", err);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Response to a successful join.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinSessionResponse {
    /// Identifier of the new participant.
    pub participant_id: Uuid,
    /// Bearer credential the participant presents on later calls.
    pub token: String,
}

/// Roster of a session's participants.
#[derive(Debug, Serialize, ToSchema)]
pub struct ParticipantsResponse {
    /// Participants in join order.
    pub participants: Vec<ParticipantSummary>,
}

/// Payload requesting an explicit status transition.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TransitionRequest {
    /// Host credential.
    pub host_token: String,
    /// Requested target status.
    pub status: SessionStatus,
}

/// Payload for host-only operations that carry no other input.
#[derive(Debug, Deserialize, ToSchema)]
pub struct HostRequest {
    /// Host credential.
    pub host_token: String,
}

/// Payload updating the auto-advance settings.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AutoAdvanceRequest {
    /// Host credential.
    pub host_token: String,
    /// Whether auto-advance is active.
    pub enabled: bool,
    /// Countdown length in seconds.
    #[validate(range(min = 5, max = 120))]
    pub seconds: u16,
    /// Whether auto-advance is temporarily paused.
    pub paused: bool,
}

/// Payload for a buzz claim on the current question.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BuzzRequest {
    /// Participant credential.
    pub token: String,
}

/// Outcome of a buzz claim.
#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct BuzzResponse {
    /// Rank assigned for the current question, starting at 1.
    pub order: u32,
    /// True when the participant already held a rank; no new one was assigned.
    pub already_claimed: bool,
}

/// Payload submitting an answer to the current question.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitAnswerRequest {
    /// Participant credential.
    pub token: String,
    /// Chosen option index.
    pub answer_index: usize,
}

/// Host payload grading one participant's answer.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GradeAnswerRequest {
    /// Host credential.
    pub host_token: String,
    /// Participant whose answer is graded.
    pub participant_id: Uuid,
    /// Round of the graded question.
    pub round: u32,
    /// Question number of the graded question.
    pub question: u32,
    /// Whether the answer was correct.
    pub correct: bool,
    /// Score delta to apply.
    #[serde(default)]
    pub points: i32,
    /// Bonus delta to apply.
    #[serde(default)]
    pub bonus: i32,
}

/// Host payload kicking off question generation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateRequest {
    /// Host credential.
    pub host_token: String,
    /// Optional topic hint passed to the authoring collaborator.
    #[serde(default)]
    pub topic: Option<String>,
}
