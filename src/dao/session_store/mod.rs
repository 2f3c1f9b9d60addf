pub mod memory;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    AnswerEntity, BuzzClaim, ParticipantEntity, QuestionEntity, SessionEntity, TaskEntity,
};
use crate::dao::storage::{StorageError, StorageResult};

/// Atomic read-modify-write applied to a session record under its lock.
/// When the closure fails the record is left untouched.
pub type SessionMutation = Box<dyn FnOnce(&mut SessionEntity) -> Result<(), StorageError> + Send>;

/// Abstraction over the shared durable store that backs every instance.
///
/// This is the only shared mutable substrate: all cross-request coordination
/// (status transitions, position advancement, buzz claims, task progress) is
/// expressed as atomic operations on single records behind this trait.
pub trait SessionStore: Send + Sync {
    /// Persist a freshly created session.
    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Look up a session by internal id.
    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    /// Look up a session by its external join code.
    fn find_session_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    /// Apply an atomic mutation to a session and return the updated record.
    fn update_session(
        &self,
        id: Uuid,
        mutation: SessionMutation,
    ) -> BoxFuture<'static, StorageResult<SessionEntity>>;
    /// Delete a session and cascade to its participants, questions, and answers.
    fn delete_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;

    /// Add a participant, enforcing name uniqueness within the session.
    fn add_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Resolve a participant from their bearer token.
    fn find_participant_by_token(
        &self,
        session_id: Uuid,
        token: String,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>>;
    /// All participants of a session in join order.
    fn list_participants(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>>;
    /// Number of participants in a session.
    fn count_participants(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<u64>>;
    /// Atomically add score/bonus points to a participant.
    fn add_score(
        &self,
        session_id: Uuid,
        participant_id: Uuid,
        points: i32,
        bonus: i32,
    ) -> BoxFuture<'static, StorageResult<ParticipantEntity>>;

    /// Insert a batch of questions, enforcing `(round, question)` uniqueness.
    fn insert_questions(
        &self,
        session_id: Uuid,
        questions: Vec<QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Look up one question by position.
    fn find_question(
        &self,
        session_id: Uuid,
        round: u32,
        question: u32,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>>;
    /// All questions of a session ordered by `(round, question)`.
    fn list_questions(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;
    /// Number of questions stored for a round.
    fn count_questions_in_round(
        &self,
        session_id: Uuid,
        round: u32,
    ) -> BoxFuture<'static, StorageResult<u64>>;

    /// Record a submitted answer; at most one per `(participant, question)`.
    fn record_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Grade an existing answer and return the updated record.
    fn set_answer_correct(
        &self,
        session_id: Uuid,
        participant_id: Uuid,
        round: u32,
        question: u32,
        correct: bool,
    ) -> BoxFuture<'static, StorageResult<AnswerEntity>>;
    /// Number of answer records for a question position.
    fn count_answers(
        &self,
        session_id: Uuid,
        round: u32,
        question: u32,
    ) -> BoxFuture<'static, StorageResult<u64>>;

    /// Ordering primitive: atomically return the participant's existing buzz
    /// rank for the question, or assign the next free one. Concurrent claims
    /// by distinct participants never receive the same rank.
    fn claim_buzz_order(
        &self,
        session_id: Uuid,
        round: u32,
        question: u32,
        participant_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<BuzzClaim>>;

    /// Insert a pending task record before any work begins.
    fn create_task(&self, task: TaskEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Look up a task by id.
    fn find_task(&self, task_id: Uuid) -> BoxFuture<'static, StorageResult<Option<TaskEntity>>>;
    /// Move a pending task to processing and stamp `started_at`.
    fn mark_task_processing(
        &self,
        task_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<TaskEntity>>;
    /// Write task progress. The stored percent never decreases; writes against
    /// a terminal task are rejected.
    fn write_task_progress(
        &self,
        task_id: Uuid,
        progress: u8,
        step: Option<String>,
    ) -> BoxFuture<'static, StorageResult<TaskEntity>>;
    /// Finalize a task successfully. Rejected once the task is terminal.
    fn complete_task(
        &self,
        task_id: Uuid,
        result: serde_json::Value,
    ) -> BoxFuture<'static, StorageResult<TaskEntity>>;
    /// Finalize a task with an unrecoverable error. Rejected once terminal.
    fn fail_task(
        &self,
        task_id: Uuid,
        error: String,
    ) -> BoxFuture<'static, StorageResult<TaskEntity>>;

    /// Verify the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
