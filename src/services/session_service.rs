//! Session lifecycle mutations: creation, joining, status transitions,
//! position advancement, countdowns, and auto-advance settings.
//!
//! Every cross-request mutation goes through `SessionStore::update_session`
//! so the read-modify-write happens atomically on the shared record.

use std::time::SystemTime;

use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{
        AutoAdvanceEntity, CompletedRound, GameVariant, ParticipantEntity, SessionEntity,
        SessionStatus,
    },
    dao::storage::StorageError,
    dto::{
        common::{ParticipantSummary, SessionSnapshot},
        session::{
            AutoAdvanceRequest, CreateSessionRequest, CreateSessionResponse, JoinSessionRequest,
            JoinSessionResponse, ParticipantsResponse, TransitionRequest,
        },
        validation::validate_join_code,
    },
    error::ServiceError,
    state::{SharedState, machine},
};

/// Attempts to find an unused join code before giving up.
const CODE_ATTEMPTS: usize = 4;

/// Set up a fresh session and hand the caller the host credential.
pub async fn create_session(
    state: &SharedState,
    request: CreateSessionRequest,
) -> Result<CreateSessionResponse, ServiceError> {
    request
        .validate()
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let host_token = Uuid::new_v4().simple().to_string();
    let now = SystemTime::now();

    let mut last_err = None;
    for _ in 0..CODE_ATTEMPTS {
        let session = SessionEntity {
            id: Uuid::new_v4(),
            code: generate_join_code(),
            host_token: host_token.clone(),
            variant: request.variant,
            status: machine::initial_status(request.variant),
            current_round: 1,
            current_question: 1,
            question_started_at: None,
            generation_progress: None,
            auto_advance: AutoAdvanceEntity::default(),
            total_rounds: request.total_rounds,
            questions_per_round: request.questions_per_round,
            halftime_before_rounds: request.halftime_before_rounds.clone(),
            completed_rounds: vec![],
            created_at: now,
            updated_at: now,
        };

        match state.store().save_session(session.clone()).await {
            Ok(()) => {
                return Ok(CreateSessionResponse {
                    session: session.into(),
                    host_token,
                });
            }
            // Join code collision: roll a new one and retry.
            Err(StorageError::Conflict { message }) => {
                last_err = Some(StorageError::Conflict { message })
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(last_err
        .map(Into::into)
        .unwrap_or_else(|| ServiceError::InvalidState("could not allocate a join code".into())))
}

/// Public snapshot of a session.
pub async fn get_session(
    state: &SharedState,
    code: &str,
) -> Result<SessionSnapshot, ServiceError> {
    Ok(resolve_session(state, code).await?.into())
}

/// Register a new participant and mint their bearer token.
pub async fn join_session(
    state: &SharedState,
    code: &str,
    request: JoinSessionRequest,
) -> Result<JoinSessionResponse, ServiceError> {
    request
        .validate()
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let session = resolve_session(state, code).await?;
    if session.status.is_terminal() {
        return Err(ServiceError::InvalidState(
            "session has already ended".into(),
        ));
    }

    let participant = ParticipantEntity {
        id: Uuid::new_v4(),
        session_id: session.id,
        name: request.name.trim().to_string(),
        score: 0,
        bonus: 0,
        token: Uuid::new_v4().simple().to_string(),
        joined_at: SystemTime::now(),
    };

    match state.store().add_participant(participant.clone()).await {
        Ok(()) => Ok(JoinSessionResponse {
            participant_id: participant.id,
            token: participant.token,
        }),
        // Name collisions are a client mistake, not a state conflict.
        Err(StorageError::Conflict { message }) => Err(ServiceError::InvalidInput(message)),
        Err(err) => Err(err.into()),
    }
}

/// Scoreboard roster of a session.
pub async fn list_participants(
    state: &SharedState,
    code: &str,
) -> Result<ParticipantsResponse, ServiceError> {
    let session = resolve_session(state, code).await?;
    let participants = state
        .store()
        .list_participants(session.id)
        .await?
        .into_iter()
        .map(ParticipantSummary::from)
        .collect();
    Ok(ParticipantsResponse { participants })
}

/// Apply an explicit status transition requested by the host.
pub async fn transition(
    state: &SharedState,
    code: &str,
    request: TransitionRequest,
) -> Result<SessionSnapshot, ServiceError> {
    let session = resolve_session(state, code).await?;
    require_host(&session, &request.host_token)?;

    let target = request.status;
    let updated = state
        .store()
        .update_session(
            session.id,
            Box::new(move |session| {
                match machine::check_transition(session.variant, session.status, target)
                    .map_err(|err| StorageError::conflict(err.to_string()))?
                {
                    machine::Transition::Identity => {}
                    machine::Transition::Move(next) => {
                        session.status = next;
                        if next == SessionStatus::InProgress {
                            // Leftover generation progress has been consumed
                            // once play starts.
                            session.clear_generation_progress();
                        }
                    }
                }
                Ok(())
            }),
        )
        .await?;

    Ok(updated.into())
}

/// Advance the session position by one step ("move to next").
pub async fn advance(
    state: &SharedState,
    code: &str,
    host_token: &str,
) -> Result<SessionSnapshot, ServiceError> {
    let session = resolve_session(state, code).await?;
    require_host(&session, host_token)?;

    let updated = state
        .store()
        .update_session(
            session.id,
            Box::new(move |session| {
                if session.variant == GameVariant::Lobby {
                    return Err(StorageError::conflict(
                        "lobby sessions have no question positions to advance",
                    ));
                }
                let outcome = machine::plan_advance(machine::AdvanceInput {
                    status: session.status,
                    current_round: session.current_round,
                    current_question: session.current_question,
                    total_rounds: session.total_rounds,
                    questions_per_round: session.questions_per_round,
                    halftime_before_rounds: &session.halftime_before_rounds,
                })
                .map_err(|err| StorageError::conflict(err.to_string()))?;

                if let Some(round) = outcome.completed_round {
                    session.completed_rounds.push(CompletedRound {
                        round,
                        completed_at: SystemTime::now(),
                    });
                }
                session.status = outcome.status;
                session.current_round = outcome.current_round;
                session.current_question = outcome.current_question;
                if outcome.clear_question_started_at {
                    session.question_started_at = None;
                }
                Ok(())
            }),
        )
        .await?;

    Ok(updated.into())
}

/// Stamp the countdown start for the current question.
///
/// Decoupled from "advance" because the narration step finishes at a variable
/// time; calling it again overwrites the stamp (last write wins).
pub async fn start_countdown(
    state: &SharedState,
    code: &str,
    host_token: &str,
) -> Result<SessionSnapshot, ServiceError> {
    let session = resolve_session(state, code).await?;
    require_host(&session, host_token)?;

    let updated = state
        .store()
        .update_session(
            session.id,
            Box::new(|session| {
                if session.status != SessionStatus::InProgress {
                    return Err(StorageError::conflict(
                        "countdown can only start while the session is in progress",
                    ));
                }
                session.question_started_at = Some(SystemTime::now());
                Ok(())
            }),
        )
        .await?;

    Ok(updated.into())
}

/// Update the auto-advance settings.
pub async fn set_auto_advance(
    state: &SharedState,
    code: &str,
    request: AutoAdvanceRequest,
) -> Result<SessionSnapshot, ServiceError> {
    request
        .validate()
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let session = resolve_session(state, code).await?;
    require_host(&session, &request.host_token)?;

    let settings = AutoAdvanceEntity {
        enabled: request.enabled,
        seconds: request.seconds,
        paused: request.paused,
    };
    let updated = state
        .store()
        .update_session(
            session.id,
            Box::new(move |session| {
                session.auto_advance = settings;
                Ok(())
            }),
        )
        .await?;

    Ok(updated.into())
}

/// Tear a session down, cascading to its participants, questions, and answers.
pub async fn delete(
    state: &SharedState,
    code: &str,
    host_token: &str,
) -> Result<(), ServiceError> {
    let session = resolve_session(state, code).await?;
    require_host(&session, host_token)?;
    state.store().delete_session(session.id).await?;
    Ok(())
}

/// Look a session up by join code or fail with a not-found error.
pub async fn resolve_session(
    state: &SharedState,
    code: &str,
) -> Result<SessionEntity, ServiceError> {
    validate_join_code(code)
        .map_err(|err| ServiceError::InvalidInput(format!("invalid join code: {err}")))?;
    state
        .store()
        .find_session_by_code(code.to_string())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session `{code}` not found")))
}

/// Verify the caller presented the session's host credential.
pub fn require_host(session: &SessionEntity, host_token: &str) -> Result<(), ServiceError> {
    if session.host_token != host_token {
        return Err(ServiceError::Unauthorized(
            "host credential required".into(),
        ));
    }
    Ok(())
}

/// Derive a 6-character uppercase join code.
fn generate_join_code() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .to_ascii_uppercase()
        .chars()
        .take(6)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::models::GameVariant,
        dao::session_store::memory::MemoryStore,
        services::collaborators::Collaborators,
        state::AppState,
    };

    fn test_state() -> SharedState {
        AppState::new(
            Arc::new(MemoryStore::new()),
            Collaborators::builtin(),
            AppConfig::default(),
        )
    }

    async fn quiz_session(state: &SharedState) -> CreateSessionResponse {
        create_session(
            state,
            CreateSessionRequest {
                variant: GameVariant::Quiz,
                total_rounds: 2,
                questions_per_round: 10,
                halftime_before_rounds: vec![2],
            },
        )
        .await
        .unwrap()
    }

    async fn start_quiz(state: &SharedState, code: &str, host_token: &str) {
        for status in [
            SessionStatus::Voting,
            SessionStatus::Ready,
            SessionStatus::InProgress,
        ] {
            transition(
                state,
                code,
                TransitionRequest {
                    host_token: host_token.into(),
                    status,
                },
            )
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn create_starts_in_registration_with_code() {
        let state = test_state();
        let created = quiz_session(&state).await;
        assert_eq!(created.session.status, SessionStatus::Registration);
        assert_eq!(created.session.code.len(), 6);
        assert_eq!(created.session.position.round, 1);
        assert_eq!(created.session.position.question, 1);
    }

    #[tokio::test]
    async fn illegal_transition_is_conflict_identity_is_noop() {
        let state = test_state();
        let created = quiz_session(&state).await;

        let err = transition(
            &state,
            &created.session.code,
            TransitionRequest {
                host_token: created.host_token.clone(),
                status: SessionStatus::InProgress,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let snapshot = transition(
            &state,
            &created.session.code,
            TransitionRequest {
                host_token: created.host_token.clone(),
                status: SessionStatus::Registration,
            },
        )
        .await
        .unwrap();
        assert_eq!(snapshot.status, SessionStatus::Registration);
    }

    #[tokio::test]
    async fn transition_requires_host_credential() {
        let state = test_state();
        let created = quiz_session(&state).await;
        let err = transition(
            &state,
            &created.session.code,
            TransitionRequest {
                host_token: "wrong".into(),
                status: SessionStatus::Voting,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn advance_walks_through_halftime_scenario() {
        let state = test_state();
        let created = quiz_session(&state).await;
        let code = created.session.code.clone();
        start_quiz(&state, &code, &created.host_token).await;

        // Walk round 1 to its last question.
        for _ in 0..9 {
            advance(&state, &code, &created.host_token).await.unwrap();
        }
        let session = resolve_session(&state, &code).await.unwrap();
        assert_eq!((session.current_round, session.current_question), (1, 10));

        // Round boundary: round 2 is flagged halftime-before.
        let snapshot = advance(&state, &code, &created.host_token).await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::Halftime);
        assert_eq!(snapshot.position.round, 2);
        assert_eq!(snapshot.position.question, 1);

        // Resume without moving position.
        let snapshot = advance(&state, &code, &created.host_token).await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::InProgress);
        assert_eq!(snapshot.position.round, 2);
        assert_eq!(snapshot.position.question, 1);

        // Exhaust round 2 to complete the session.
        for _ in 0..9 {
            advance(&state, &code, &created.host_token).await.unwrap();
        }
        let snapshot = advance(&state, &code, &created.host_token).await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn countdown_stamps_and_advance_clears() {
        let state = test_state();
        let created = quiz_session(&state).await;
        let code = created.session.code.clone();
        start_quiz(&state, &code, &created.host_token).await;

        let snapshot = start_countdown(&state, &code, &created.host_token)
            .await
            .unwrap();
        assert!(snapshot.question_started_at.is_some());

        // Last write wins on a second call.
        let snapshot = start_countdown(&state, &code, &created.host_token)
            .await
            .unwrap();
        assert!(snapshot.question_started_at.is_some());

        let snapshot = advance(&state, &code, &created.host_token).await.unwrap();
        assert!(snapshot.question_started_at.is_none());
    }

    #[tokio::test]
    async fn join_rejects_duplicate_names_and_ended_sessions() {
        let state = test_state();
        let created = quiz_session(&state).await;
        let code = created.session.code.clone();

        join_session(
            &state,
            &code,
            JoinSessionRequest {
                name: "Quizzards".into(),
            },
        )
        .await
        .unwrap();

        let err = join_session(
            &state,
            &code,
            JoinSessionRequest {
                name: "Quizzards".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn lobby_sessions_skip_rounds_entirely() {
        let state = test_state();
        let created = create_session(
            &state,
            CreateSessionRequest {
                variant: GameVariant::Lobby,
                total_rounds: 1,
                questions_per_round: 1,
                halftime_before_rounds: vec![],
            },
        )
        .await
        .unwrap();
        let code = created.session.code.clone();
        assert_eq!(created.session.status, SessionStatus::Lobby);

        transition(
            &state,
            &code,
            TransitionRequest {
                host_token: created.host_token.clone(),
                status: SessionStatus::InProgress,
            },
        )
        .await
        .unwrap();

        let err = advance(&state, &code, &created.host_token).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let snapshot = transition(
            &state,
            &code,
            TransitionRequest {
                host_token: created.host_token.clone(),
                status: SessionStatus::Completed,
            },
        )
        .await
        .unwrap();
        assert_eq!(snapshot.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn malformed_join_code_is_rejected_up_front() {
        let state = test_state();
        let err = get_session(&state, "nope").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn delete_requires_host_and_removes_the_session() {
        let state = test_state();
        let created = quiz_session(&state).await;
        let code = created.session.code.clone();

        let err = delete(&state, &code, "wrong").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        delete(&state, &code, &created.host_token).await.unwrap();
        let err = resolve_session(&state, &code).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn auto_advance_settings_are_validated_and_stored() {
        let state = test_state();
        let created = quiz_session(&state).await;
        let code = created.session.code.clone();

        let err = set_auto_advance(
            &state,
            &code,
            AutoAdvanceRequest {
                host_token: created.host_token.clone(),
                enabled: true,
                seconds: 3,
                paused: false,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let snapshot = set_auto_advance(
            &state,
            &code,
            AutoAdvanceRequest {
                host_token: created.host_token.clone(),
                enabled: true,
                seconds: 45,
                paused: true,
            },
        )
        .await
        .unwrap();
        assert!(snapshot.auto_advance.enabled);
        assert_eq!(snapshot.auto_advance.seconds, 45);
        assert!(snapshot.auto_advance.paused);
    }
}
