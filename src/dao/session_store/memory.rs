//! In-memory reference backend for [`SessionStore`].
//!
//! Every operation that the trait requires to be atomic is performed while
//! holding the DashMap entry guard for the affected key, so concurrent
//! writers serialize on the record exactly like a transactional database
//! backend would.

use std::{sync::Arc, time::SystemTime};

use dashmap::{DashMap, Entry};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    AnswerEntity, BuzzClaim, ParticipantEntity, QuestionEntity, SessionEntity, TaskEntity,
    TaskStatus,
};
use crate::dao::session_store::{SessionMutation, SessionStore};
use crate::dao::storage::{StorageError, StorageResult};

/// `(session, round, question)` key addressing one question's answer set.
type QuestionKey = (Uuid, u32, u32);

#[derive(Default)]
struct Inner {
    sessions: DashMap<Uuid, SessionEntity>,
    codes: DashMap<String, Uuid>,
    participants: DashMap<Uuid, Vec<ParticipantEntity>>,
    questions: DashMap<Uuid, Vec<QuestionEntity>>,
    answers: DashMap<QuestionKey, Vec<AnswerEntity>>,
    tasks: DashMap<Uuid, TaskEntity>,
}

/// In-memory [`SessionStore`] used by the binary and the test-suite.
#[derive(Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if inner.sessions.contains_key(&session.id) {
                return Err(StorageError::conflict(format!(
                    "session `{}` already exists",
                    session.id
                )));
            }
            // The code entry guard is held across the session insert, so
            // concurrent saves racing on one code serialize here.
            match inner.codes.entry(session.code.clone()) {
                Entry::Occupied(_) => Err(StorageError::conflict(format!(
                    "join code `{}` already in use",
                    session.code
                ))),
                Entry::Vacant(slot) => {
                    let id = session.id;
                    inner.sessions.insert(id, session);
                    slot.insert(id);
                    Ok(())
                }
            }
        })
    }

    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.sessions.get(&id).map(|entry| entry.clone())) })
    }

    fn find_session_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let Some(id) = inner.codes.get(&code).map(|entry| *entry) else {
                return Ok(None);
            };
            Ok(inner.sessions.get(&id).map(|entry| entry.clone()))
        })
    }

    fn update_session(
        &self,
        id: Uuid,
        mutation: SessionMutation,
    ) -> BoxFuture<'static, StorageResult<SessionEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut entry = inner
                .sessions
                .get_mut(&id)
                .ok_or_else(|| StorageError::not_found(format!("session `{id}`")))?;

            // Mutate a scratch copy so a failing closure leaves the record intact.
            let mut scratch = entry.clone();
            mutation(&mut scratch)?;
            scratch.updated_at = SystemTime::now();
            *entry = scratch.clone();
            Ok(scratch)
        })
    }

    fn delete_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let Some((_, session)) = inner.sessions.remove(&id) else {
                return Err(StorageError::not_found(format!("session `{id}`")));
            };
            // Dependents first, then the code index.
            inner.participants.remove(&id);
            inner.questions.remove(&id);
            inner.answers.retain(|(session_id, _, _), _| *session_id != id);
            inner.codes.remove(&session.code);
            Ok(())
        })
    }

    fn add_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if !inner.sessions.contains_key(&participant.session_id) {
                return Err(StorageError::not_found(format!(
                    "session `{}`",
                    participant.session_id
                )));
            }
            let mut roster = inner
                .participants
                .entry(participant.session_id)
                .or_default();
            let name_taken = roster
                .iter()
                .any(|existing| existing.name.eq_ignore_ascii_case(&participant.name));
            if name_taken {
                return Err(StorageError::conflict(format!(
                    "name `{}` is already taken in this session",
                    participant.name
                )));
            }
            roster.push(participant);
            Ok(())
        })
    }

    fn find_participant_by_token(
        &self,
        session_id: Uuid,
        token: String,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let Some(roster) = inner.participants.get(&session_id) else {
                return Ok(None);
            };
            Ok(roster
                .iter()
                .find(|participant| participant.token == token)
                .cloned())
        })
    }

    fn list_participants(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .participants
                .get(&session_id)
                .map(|roster| roster.clone())
                .unwrap_or_default())
        })
    }

    fn count_participants(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<u64>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .participants
                .get(&session_id)
                .map(|roster| roster.len() as u64)
                .unwrap_or(0))
        })
    }

    fn add_score(
        &self,
        session_id: Uuid,
        participant_id: Uuid,
        points: i32,
        bonus: i32,
    ) -> BoxFuture<'static, StorageResult<ParticipantEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut roster = inner
                .participants
                .get_mut(&session_id)
                .ok_or_else(|| StorageError::not_found(format!("session `{session_id}`")))?;
            let participant = roster
                .iter_mut()
                .find(|participant| participant.id == participant_id)
                .ok_or_else(|| {
                    StorageError::not_found(format!("participant `{participant_id}`"))
                })?;
            participant.score += points;
            participant.bonus += bonus;
            Ok(participant.clone())
        })
    }

    fn insert_questions(
        &self,
        session_id: Uuid,
        questions: Vec<QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut stored = inner.questions.entry(session_id).or_default();
            let mut seen: std::collections::HashSet<(u32, u32)> = stored
                .iter()
                .map(|q| (q.round_number, q.question_number))
                .collect();
            for question in &questions {
                if !seen.insert((question.round_number, question.question_number)) {
                    return Err(StorageError::conflict(format!(
                        "question ({}, {}) already exists",
                        question.round_number, question.question_number
                    )));
                }
            }
            stored.extend(questions);
            Ok(())
        })
    }

    fn find_question(
        &self,
        session_id: Uuid,
        round: u32,
        question: u32,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let Some(stored) = inner.questions.get(&session_id) else {
                return Ok(None);
            };
            Ok(stored
                .iter()
                .find(|q| q.round_number == round && q.question_number == question)
                .cloned())
        })
    }

    fn list_questions(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut questions = inner
                .questions
                .get(&session_id)
                .map(|stored| stored.clone())
                .unwrap_or_default();
            questions.sort_by_key(|q| (q.round_number, q.question_number));
            Ok(questions)
        })
    }

    fn count_questions_in_round(
        &self,
        session_id: Uuid,
        round: u32,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .questions
                .get(&session_id)
                .map(|stored| stored.iter().filter(|q| q.round_number == round).count() as u64)
                .unwrap_or(0))
        })
    }

    fn record_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let key = (
                answer.session_id,
                answer.round_number,
                answer.question_number,
            );
            let mut records = inner.answers.entry(key).or_default();
            match records
                .iter_mut()
                .find(|existing| existing.participant_id == answer.participant_id)
            {
                Some(existing) if existing.answer_index.is_some() => {
                    Err(StorageError::conflict("answer already submitted"))
                }
                Some(existing) => {
                    // A buzz-only record exists for this participant; attach the answer.
                    existing.answer_index = answer.answer_index;
                    existing.submitted_at = answer.submitted_at;
                    Ok(())
                }
                None => {
                    records.push(answer);
                    Ok(())
                }
            }
        })
    }

    fn set_answer_correct(
        &self,
        session_id: Uuid,
        participant_id: Uuid,
        round: u32,
        question: u32,
        correct: bool,
    ) -> BoxFuture<'static, StorageResult<AnswerEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let key = (session_id, round, question);
            let mut records = inner
                .answers
                .get_mut(&key)
                .ok_or_else(|| StorageError::not_found("no answers for this question"))?;
            let record = records
                .iter_mut()
                .find(|existing| existing.participant_id == participant_id)
                .ok_or_else(|| {
                    StorageError::not_found(format!(
                        "answer by participant `{participant_id}`"
                    ))
                })?;
            record.correct = Some(correct);
            Ok(record.clone())
        })
    }

    fn count_answers(
        &self,
        session_id: Uuid,
        round: u32,
        question: u32,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .answers
                .get(&(session_id, round, question))
                .map(|records| {
                    records
                        .iter()
                        .filter(|record| record.answer_index.is_some())
                        .count() as u64
                })
                .unwrap_or(0))
        })
    }

    fn claim_buzz_order(
        &self,
        session_id: Uuid,
        round: u32,
        question: u32,
        participant_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<BuzzClaim>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            // The entry guard is held for the whole check-then-assign sequence,
            // which is what makes the primitive race-free.
            let mut records = inner.answers.entry((session_id, round, question)).or_default();

            if let Some(existing) = records.iter().find(|record| {
                record.participant_id == participant_id && record.buzz_order.is_some()
            }) {
                return Ok(BuzzClaim {
                    order: existing.buzz_order.unwrap_or(0),
                    already_claimed: true,
                    claimed_at: existing.submitted_at,
                });
            }

            let next_order = records
                .iter()
                .filter_map(|record| record.buzz_order)
                .max()
                .unwrap_or(0)
                + 1;
            let claimed_at = SystemTime::now();

            match records
                .iter_mut()
                .find(|record| record.participant_id == participant_id)
            {
                Some(existing) => existing.buzz_order = Some(next_order),
                None => records.push(AnswerEntity {
                    session_id,
                    participant_id,
                    round_number: round,
                    question_number: question,
                    submitted_at: claimed_at,
                    answer_index: None,
                    correct: None,
                    buzz_order: Some(next_order),
                }),
            }

            Ok(BuzzClaim {
                order: next_order,
                already_claimed: false,
                claimed_at,
            })
        })
    }

    fn create_task(&self, task: TaskEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if inner.tasks.contains_key(&task.task_id) {
                return Err(StorageError::conflict(format!(
                    "task `{}` already exists",
                    task.task_id
                )));
            }
            inner.tasks.insert(task.task_id, task);
            Ok(())
        })
    }

    fn find_task(&self, task_id: Uuid) -> BoxFuture<'static, StorageResult<Option<TaskEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.tasks.get(&task_id).map(|entry| entry.clone())) })
    }

    fn mark_task_processing(
        &self,
        task_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<TaskEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut task = inner
                .tasks
                .get_mut(&task_id)
                .ok_or_else(|| StorageError::not_found(format!("task `{task_id}`")))?;
            if task.status != TaskStatus::Pending {
                return Err(StorageError::conflict(format!(
                    "task `{task_id}` is not pending"
                )));
            }
            task.status = TaskStatus::Processing;
            task.started_at = Some(SystemTime::now());
            Ok(task.clone())
        })
    }

    fn write_task_progress(
        &self,
        task_id: Uuid,
        progress: u8,
        step: Option<String>,
    ) -> BoxFuture<'static, StorageResult<TaskEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut task = inner
                .tasks
                .get_mut(&task_id)
                .ok_or_else(|| StorageError::not_found(format!("task `{task_id}`")))?;
            if task.status != TaskStatus::Processing {
                return Err(StorageError::conflict(format!(
                    "task `{task_id}` is not processing"
                )));
            }
            // Stored progress never regresses.
            task.progress = task.progress.max(progress.min(100));
            if step.is_some() {
                task.step = step;
            }
            Ok(task.clone())
        })
    }

    fn complete_task(
        &self,
        task_id: Uuid,
        result: serde_json::Value,
    ) -> BoxFuture<'static, StorageResult<TaskEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut task = inner
                .tasks
                .get_mut(&task_id)
                .ok_or_else(|| StorageError::not_found(format!("task `{task_id}`")))?;
            if task.status != TaskStatus::Processing {
                return Err(StorageError::conflict(format!(
                    "task `{task_id}` cannot complete from {:?}",
                    task.status
                )));
            }
            task.status = TaskStatus::Completed;
            task.progress = 100;
            task.result = Some(result);
            task.completed_at = Some(SystemTime::now());
            Ok(task.clone())
        })
    }

    fn fail_task(
        &self,
        task_id: Uuid,
        error: String,
    ) -> BoxFuture<'static, StorageResult<TaskEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut task = inner
                .tasks
                .get_mut(&task_id)
                .ok_or_else(|| StorageError::not_found(format!("task `{task_id}`")))?;
            if task.status != TaskStatus::Processing {
                return Err(StorageError::conflict(format!(
                    "task `{task_id}` cannot fail from {:?}",
                    task.status
                )));
            }
            task.status = TaskStatus::Failed;
            task.error = Some(error);
            task.completed_at = Some(SystemTime::now());
            Ok(task.clone())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
