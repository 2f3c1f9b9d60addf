//! Background executors: question generation, answer-sheet rendering, and
//! question narration.
//!
//! Workers are detached `tokio::spawn` units owned by the instance that
//! created them; everything they produce flows back through the task registry
//! and the session record, never through process memory.

use std::{fmt::Write as _, sync::Arc};

use futures::{StreamExt, stream::FuturesUnordered};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{GameVariant, QuestionEntity, SessionEntity, SessionStatus, TaskKind},
    dao::session_store::SessionStore,
    dto::{
        session::{GenerateRequest, HostRequest},
        task::TaskCreatedResponse,
    },
    error::ServiceError,
    services::{
        collaborators::{
            AuthoredQuestion, DocumentRenderer, ObjectStore, QuestionAuthor, RoundRequest,
            SpeechSynthesizer,
        },
        session_service::{require_host, resolve_session},
        task_service::{ProgressReporter, register_task},
    },
    state::SharedState,
};

/// Progress reserved for setup before the fan-out begins.
const PROGRESS_BASE: u8 = 5;
/// Progress budget distributed across authoring sub-units; the remainder is
/// kept back so progress stays below 100 until the task truly finishes.
const PROGRESS_SPAN: u8 = 90;

/// Create a question-generation task and dispatch its worker.
pub async fn start_generation(
    state: &SharedState,
    code: &str,
    request: GenerateRequest,
) -> Result<TaskCreatedResponse, ServiceError> {
    let session = resolve_session(state, code).await?;
    require_host(&session, &request.host_token)?;

    if session.variant != GameVariant::Quiz {
        return Err(ServiceError::InvalidState(
            "only quiz sessions use generated questions".into(),
        ));
    }
    if !matches!(
        session.status,
        SessionStatus::Registration | SessionStatus::Voting | SessionStatus::Ready
    ) {
        return Err(ServiceError::InvalidState(format!(
            "questions can only be generated before play starts (status {:?})",
            session.status
        )));
    }
    if state.store().count_questions_in_round(session.id, 1).await? > 0 {
        return Err(ServiceError::InvalidState(
            "questions were already generated for this session".into(),
        ));
    }

    let task = register_task(&state.store(), TaskKind::QuestionGeneration).await?;
    let task_id = task.task_id;

    let store = state.store();
    let author = state.collaborators().author.clone();
    tokio::spawn(run_generation(store, author, session, task_id, request.topic));

    Ok(TaskCreatedResponse { task_id })
}

/// Create an answer-sheet rendering task and dispatch its worker.
pub async fn start_render(
    state: &SharedState,
    code: &str,
    request: HostRequest,
) -> Result<TaskCreatedResponse, ServiceError> {
    let session = resolve_session(state, code).await?;
    require_host(&session, &request.host_token)?;

    let task = register_task(&state.store(), TaskKind::DocumentRender).await?;
    let task_id = task.task_id;

    let store = state.store();
    let renderer = state.collaborators().renderer.clone();
    let objects = state.collaborators().objects.clone();
    tokio::spawn(run_render(store, renderer, objects, session, task_id));

    Ok(TaskCreatedResponse { task_id })
}

/// Create a narration task for the current question and dispatch its worker.
pub async fn start_narration(
    state: &SharedState,
    code: &str,
    request: HostRequest,
) -> Result<TaskCreatedResponse, ServiceError> {
    let session = resolve_session(state, code).await?;
    require_host(&session, &request.host_token)?;

    let question = state
        .store()
        .find_question(session.id, session.current_round, session.current_question)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "no question at ({}, {})",
                session.current_round, session.current_question
            ))
        })?;

    let task = register_task(&state.store(), TaskKind::AudioSynthesis).await?;
    let task_id = task.task_id;

    let store = state.store();
    let synthesizer = state.collaborators().synthesizer.clone();
    let objects = state.collaborators().objects.clone();
    tokio::spawn(run_narration(
        store,
        synthesizer,
        objects,
        session,
        question,
        task_id,
    ));

    Ok(TaskCreatedResponse { task_id })
}

/// Worker body for question generation.
///
/// Rounds are authored concurrently; overall progress is the base offset plus
/// the completed fraction of the span, written after each sub-unit finishes.
/// A failed sub-unit degrades into a placeholder round rather than aborting
/// the whole task; only structural problems fail it outright.
async fn run_generation(
    store: Arc<dyn SessionStore>,
    author: Arc<dyn QuestionAuthor>,
    session: SessionEntity,
    task_id: Uuid,
    topic: Option<String>,
) {
    if let Err(err) = store.mark_task_processing(task_id).await {
        error!(%task_id, error = %err, "could not claim generation task");
        return;
    }
    let reporter = ProgressReporter::new(store.clone(), task_id, Some(session.id));
    reporter.report(PROGRESS_BASE, "authoring questions").await;

    let total_rounds = session.total_rounds;
    let questions_per_round = session.questions_per_round;
    if total_rounds == 0 || questions_per_round == 0 {
        finalize_failure(&store, task_id, "session has no rounds to generate").await;
        return;
    }

    let mut pending: FuturesUnordered<_> = (1..=total_rounds)
        .map(|round_number| {
            let author = author.clone();
            let topic = topic.clone();
            async move {
                let result = author
                    .author_round(RoundRequest {
                        round_number,
                        question_count: questions_per_round,
                        topic,
                    })
                    .await;
                (round_number, result)
            }
        })
        .collect();

    let mut authored: Vec<(u32, Vec<AuthoredQuestion>)> = Vec::new();
    let mut degraded_rounds = 0u32;
    let mut completed_units = 0u32;

    while let Some((round_number, result)) = pending.next().await {
        let questions = match result {
            Ok(questions) if questions.len() as u32 == questions_per_round => questions,
            Ok(questions) => {
                warn!(
                    %task_id,
                    round_number,
                    got = questions.len(),
                    expected = questions_per_round,
                    "authoring returned wrong question count; using placeholders"
                );
                degraded_rounds += 1;
                fallback_round(round_number, questions_per_round)
            }
            Err(err) => {
                warn!(
                    %task_id,
                    round_number,
                    error = %err,
                    "round authoring failed; using placeholders"
                );
                degraded_rounds += 1;
                fallback_round(round_number, questions_per_round)
            }
        };
        authored.push((round_number, questions));

        completed_units += 1;
        let percent =
            PROGRESS_BASE + ((completed_units * PROGRESS_SPAN as u32) / total_rounds) as u8;
        reporter
            .report(
                percent,
                &format!("authored round {completed_units} of {total_rounds}"),
            )
            .await;
    }

    authored.sort_by_key(|(round_number, _)| *round_number);
    let entities: Vec<QuestionEntity> = authored
        .into_iter()
        .flat_map(|(round_number, questions)| {
            questions
                .into_iter()
                .enumerate()
                .map(move |(index, question)| QuestionEntity {
                    session_id: session.id,
                    round_number,
                    question_number: index as u32 + 1,
                    text: question.text,
                    options: question.options,
                    correct_index: question.correct_index,
                    fun_fact: question.fun_fact,
                })
                .collect::<Vec<_>>()
        })
        .collect();
    let question_count = entities.len();

    // The host may have torn the session down while rounds were authoring.
    match store.find_session(session.id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            finalize_failure(&store, task_id, "session was deleted during generation").await;
            return;
        }
        Err(err) => {
            finalize_failure(&store, task_id, &format!("session re-read failed: {err}")).await;
            return;
        }
    }

    if let Err(err) = store.insert_questions(session.id, entities).await {
        finalize_failure(&store, task_id, &format!("storing questions failed: {err}")).await;
        return;
    }

    // Make the finished state observable to streams before the task flips
    // terminal; the mirror is cleared once the host starts play.
    if let Err(err) = store
        .update_session(
            session.id,
            Box::new(|session| {
                session.set_generation_progress(100, "generation complete".into());
                Ok(())
            }),
        )
        .await
    {
        warn!(%task_id, error = %err, "final session progress write failed");
    }

    match store
        .complete_task(
            task_id,
            json!({
                "rounds": total_rounds,
                "questions": question_count,
                "degraded_rounds": degraded_rounds,
            }),
        )
        .await
    {
        Ok(_) => info!(%task_id, question_count, degraded_rounds, "generation finished"),
        Err(err) => error!(%task_id, error = %err, "could not complete generation task"),
    }
}

/// Worker body for answer-sheet rendering.
async fn run_render(
    store: Arc<dyn SessionStore>,
    renderer: Arc<dyn DocumentRenderer>,
    objects: Arc<dyn ObjectStore>,
    session: SessionEntity,
    task_id: Uuid,
) {
    if let Err(err) = store.mark_task_processing(task_id).await {
        error!(%task_id, error = %err, "could not claim render task");
        return;
    }
    let reporter = ProgressReporter::new(store.clone(), task_id, None);
    reporter.report(20, "rendering answer sheet").await;

    let questions = match store.list_questions(session.id).await {
        Ok(questions) if !questions.is_empty() => questions,
        Ok(_) => {
            finalize_failure(&store, task_id, "session has no questions to render").await;
            return;
        }
        Err(err) => {
            finalize_failure(&store, task_id, &format!("loading questions failed: {err}")).await;
            return;
        }
    };

    let mut body = String::new();
    for question in &questions {
        let answer = question
            .options
            .get(question.correct_index)
            .map(String::as_str)
            .unwrap_or("?");
        let _ = writeln!(
            body,
            "R{} Q{}: {} -> {answer}",
            question.round_number, question.question_number, question.text
        );
    }

    let bytes = match renderer
        .render(format!("Answer sheet {}", session.code), body)
        .await
    {
        Ok(bytes) => bytes,
        Err(err) => {
            finalize_failure(&store, task_id, &format!("rendering failed: {err}")).await;
            return;
        }
    };

    reporter.report(70, "uploading document").await;
    let key = format!("sessions/{}/answer-sheet.txt", session.code);
    match objects.put(key, bytes).await {
        Ok(url) => {
            if let Err(err) = store.complete_task(task_id, json!({ "url": url })).await {
                error!(%task_id, error = %err, "could not complete render task");
            }
        }
        Err(err) => {
            finalize_failure(&store, task_id, &format!("upload failed: {err}")).await;
        }
    }
}

/// Worker body for question narration.
async fn run_narration(
    store: Arc<dyn SessionStore>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    objects: Arc<dyn ObjectStore>,
    session: SessionEntity,
    question: QuestionEntity,
    task_id: Uuid,
) {
    if let Err(err) = store.mark_task_processing(task_id).await {
        error!(%task_id, error = %err, "could not claim narration task");
        return;
    }
    let reporter = ProgressReporter::new(store.clone(), task_id, None);
    reporter.report(30, "synthesizing narration").await;

    let audio = match synthesizer.synthesize(question.text.clone()).await {
        Ok(audio) => audio,
        Err(err) => {
            finalize_failure(&store, task_id, &format!("synthesis failed: {err}")).await;
            return;
        }
    };

    reporter.report(70, "uploading audio").await;
    let key = format!(
        "sessions/{}/r{}q{}.audio",
        session.code, question.round_number, question.question_number
    );
    match objects.put(key, audio).await {
        Ok(url) => {
            if let Err(err) = store.complete_task(task_id, json!({ "url": url })).await {
                error!(%task_id, error = %err, "could not complete narration task");
            }
        }
        Err(err) => {
            finalize_failure(&store, task_id, &format!("upload failed: {err}")).await;
        }
    }
}

/// Placeholder round used when an authoring sub-unit fails.
fn fallback_round(round_number: u32, question_count: u32) -> Vec<AuthoredQuestion> {
    (1..=question_count)
        .map(|number| AuthoredQuestion {
            text: format!("Round {round_number} question {number} (placeholder)"),
            options: vec![
                "Option A".into(),
                "Option B".into(),
                "Option C".into(),
                "Option D".into(),
            ],
            correct_index: 0,
            fun_fact: None,
        })
        .collect()
}

/// Record the failure on the task; the error never escapes the worker.
async fn finalize_failure(store: &Arc<dyn SessionStore>, task_id: Uuid, message: &str) {
    warn!(%task_id, message, "task failed");
    if let Err(err) = store.fail_task(task_id, message.to_string()).await {
        error!(%task_id, error = %err, "could not record task failure");
    }
}
