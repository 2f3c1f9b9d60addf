use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Which game flavour a session runs. The quiz flavour carries the full
/// registration/voting/halftime lifecycle; the lobby flavour (bingo, social
/// mixer) uses the shorter lobby lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameVariant {
    /// Round/question based quiz with halftime pauses.
    Quiz,
    /// Lobby-style game without rounds (bingo, mixer).
    Lobby,
}

/// Lifecycle status of a session. Which statuses are reachable depends on the
/// session's [`GameVariant`]; the adjacency rules live in `state::machine`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Participants are signing up (quiz variant).
    Registration,
    /// Participants vote on topics (quiz variant).
    Voting,
    /// Content is generated and the host can start (quiz variant).
    Ready,
    /// Waiting room before play begins (lobby variant).
    Lobby,
    /// Gameplay is active.
    InProgress,
    /// Scheduled pause between rounds, resumable without moving position.
    Halftime,
    /// Terminal state; the session is over.
    Completed,
}

impl SessionStatus {
    /// Whether the status is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed)
    }
}

/// Progress of a background generation run mirrored onto the session so
/// connected clients can observe it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct GenerationProgressEntity {
    /// Completion percentage, 0 to 100, non-decreasing while present.
    pub percent: u8,
    /// Human readable description of the current step.
    pub status_text: String,
}

/// Auto-advance settings controlling whether the session moves to the next
/// question on its own once the countdown elapses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct AutoAdvanceEntity {
    /// Whether auto-advance is active.
    pub enabled: bool,
    /// Countdown length in seconds, 5 to 120.
    pub seconds: u16,
    /// Whether the host temporarily paused auto-advance.
    pub paused: bool,
}

impl Default for AutoAdvanceEntity {
    fn default() -> Self {
        Self {
            enabled: false,
            seconds: 30,
            paused: false,
        }
    }
}

/// Aggregate session entity persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionEntity {
    /// Primary key of the session.
    pub id: Uuid,
    /// External-facing join code.
    pub code: String,
    /// Bearer credential required for host-only operations.
    pub host_token: String,
    /// Game flavour the session runs.
    pub variant: GameVariant,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Current round, 1-based, never decreases.
    pub current_round: u32,
    /// Current question within the round, 1-based, never decreases within a round.
    pub current_question: u32,
    /// Set when the countdown for the current position started; cleared on advance.
    pub question_started_at: Option<SystemTime>,
    /// Progress of any in-flight generation work, written only by the executor.
    pub generation_progress: Option<GenerationProgressEntity>,
    /// Auto-advance configuration.
    pub auto_advance: AutoAdvanceEntity,
    /// Number of rounds the session plays.
    pub total_rounds: u32,
    /// Number of questions in every round.
    pub questions_per_round: u32,
    /// Rounds preceded by a halftime pause.
    pub halftime_before_rounds: Vec<u32>,
    /// Rounds already played, with their completion timestamps.
    pub completed_rounds: Vec<CompletedRound>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last mutation timestamp, maintained by the store.
    pub updated_at: SystemTime,
}

/// Completion marker for a finished round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletedRound {
    /// Round number that finished.
    pub round: u32,
    /// When the round was marked complete.
    pub completed_at: SystemTime,
}

impl SessionEntity {
    /// Write generation progress, clamping so the visible percent never
    /// decreases while progress is present.
    pub fn set_generation_progress(&mut self, percent: u8, status_text: String) {
        let floor = self
            .generation_progress
            .as_ref()
            .map(|progress| progress.percent)
            .unwrap_or(0);
        self.generation_progress = Some(GenerationProgressEntity {
            percent: percent.clamp(floor, 100),
            status_text,
        });
    }

    /// Clear generation progress once the work's outcome has been consumed.
    pub fn clear_generation_progress(&mut self) {
        self.generation_progress = None;
    }
}

/// A team or player inside a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantEntity {
    /// Stable identifier for the participant.
    pub id: Uuid,
    /// Session the participant belongs to.
    pub session_id: Uuid,
    /// Display name, unique within the session.
    pub name: String,
    /// Accumulated score.
    pub score: i32,
    /// Accumulated bonus points.
    pub bonus: i32,
    /// Unguessable bearer credential used instead of a login.
    pub token: String,
    /// When the participant joined.
    pub joined_at: SystemTime,
}

/// A quiz question, immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Session the question belongs to.
    pub session_id: Uuid,
    /// Round the question is asked in, 1-based.
    pub round_number: u32,
    /// Position within the round, 1-based. `(round, question)` is unique per session.
    pub question_number: u32,
    /// Question text.
    pub text: String,
    /// Answer options in display order.
    pub options: Vec<String>,
    /// Index into `options` of the correct answer.
    pub correct_index: usize,
    /// Optional trivia revealed after the question.
    pub fun_fact: Option<String>,
}

/// Ties one participant to one question: a submitted answer, a buzz claim,
/// or both. At most one record per `(participant, question)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerEntity {
    /// Session the answer belongs to.
    pub session_id: Uuid,
    /// Participant who answered or buzzed.
    pub participant_id: Uuid,
    /// Round of the question.
    pub round_number: u32,
    /// Question number within the round.
    pub question_number: u32,
    /// When the record was first created.
    pub submitted_at: SystemTime,
    /// Chosen option, if an answer was submitted.
    pub answer_index: Option<usize>,
    /// Correctness as graded by the host.
    pub correct: Option<bool>,
    /// Buzz rank: positive, unique within the question, assigned exactly once.
    pub buzz_order: Option<u32>,
}

/// Outcome of a buzz claim through the ordering primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuzzClaim {
    /// Rank assigned to the participant for this question, starting at 1.
    pub order: u32,
    /// True when the participant already held a rank and no new one was assigned.
    pub already_claimed: bool,
    /// When the rank was originally claimed.
    pub claimed_at: SystemTime,
}

/// Kind of background work a task performs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// AI question authoring for a session.
    QuestionGeneration,
    /// Document/PDF rendering.
    DocumentRender,
    /// Speech or music synthesis.
    AudioSynthesis,
}

/// Execution status of a background task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet picked up by a worker.
    Pending,
    /// A worker is executing the task.
    Processing,
    /// Finished successfully; `result` is set.
    Completed,
    /// Finished with an unrecoverable error; `error` is set.
    Failed,
}

impl TaskStatus {
    /// Whether the status is terminal and therefore frozen.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Durable record representing one unit of background work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskEntity {
    /// Globally unique identifier, assigned by the requester before dispatch.
    pub task_id: Uuid,
    /// What kind of work the task performs.
    pub kind: TaskKind,
    /// Current execution status.
    pub status: TaskStatus,
    /// Completion percentage, 0 to 100, non-decreasing while processing.
    pub progress: u8,
    /// Human readable description of the current step.
    pub step: Option<String>,
    /// Opaque success payload, set only when completed.
    pub result: Option<serde_json::Value>,
    /// Failure description, set only when failed.
    pub error: Option<String>,
    /// When the record was created.
    pub created_at: SystemTime,
    /// When a worker started executing.
    pub started_at: Option<SystemTime>,
    /// When the task reached a terminal status.
    pub completed_at: Option<SystemTime>,
}

impl TaskEntity {
    /// Build a fresh pending task record.
    pub fn pending(task_id: Uuid, kind: TaskKind) -> Self {
        Self {
            task_id,
            kind,
            status: TaskStatus::Pending,
            progress: 0,
            step: None,
            result: None,
            error: None,
            created_at: SystemTime::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionEntity {
        let now = SystemTime::now();
        SessionEntity {
            id: Uuid::new_v4(),
            code: "AB12CD".into(),
            host_token: "host".into(),
            variant: GameVariant::Quiz,
            status: SessionStatus::Registration,
            current_round: 1,
            current_question: 1,
            question_started_at: None,
            generation_progress: None,
            auto_advance: AutoAdvanceEntity::default(),
            total_rounds: 1,
            questions_per_round: 1,
            halftime_before_rounds: vec![],
            completed_rounds: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn mirrored_progress_never_regresses_until_cleared() {
        let mut session = session();

        session.set_generation_progress(50, "halfway".into());
        // A stale lower write keeps the higher percent but takes the new text.
        session.set_generation_progress(30, "late write".into());
        let progress = session.generation_progress.as_ref().unwrap();
        assert_eq!(progress.percent, 50);
        assert_eq!(progress.status_text, "late write");

        session.set_generation_progress(80, "nearly there".into());
        assert_eq!(session.generation_progress.as_ref().unwrap().percent, 80);

        session.clear_generation_progress();
        assert!(session.generation_progress.is_none());
    }

    #[test]
    fn mirrored_progress_is_capped_at_one_hundred() {
        let mut session = session();
        session.set_generation_progress(250, "overflowing".into());
        assert_eq!(session.generation_progress.as_ref().unwrap().percent, 100);
    }
}
