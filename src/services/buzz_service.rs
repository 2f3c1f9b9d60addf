//! Buzzer claims, answer submission, and host grading.

use std::time::SystemTime;

use crate::{
    dao::models::{AnswerEntity, ParticipantEntity, SessionEntity, SessionStatus},
    dto::{
        common::ParticipantSummary,
        session::{BuzzRequest, BuzzResponse, GradeAnswerRequest, SubmitAnswerRequest},
    },
    error::ServiceError,
    services::session_service::{require_host, resolve_session},
    state::SharedState,
};

/// Claim a buzz rank on the session's current question.
///
/// The heavy lifting happens in the store's ordering primitive, which runs the
/// check-then-assign sequence as one atomic unit; re-claiming returns the
/// existing rank with the `already_claimed` flag instead of a new number.
pub async fn claim_buzz(
    state: &SharedState,
    code: &str,
    request: BuzzRequest,
) -> Result<BuzzResponse, ServiceError> {
    let session = resolve_session(state, code).await?;
    require_in_progress(&session)?;
    let participant = authenticate(state, &session, &request.token).await?;

    let claim = state
        .store()
        .claim_buzz_order(
            session.id,
            session.current_round,
            session.current_question,
            participant.id,
        )
        .await?;

    Ok(BuzzResponse {
        order: claim.order,
        already_claimed: claim.already_claimed,
    })
}

/// Submit an answer for the session's current question.
pub async fn submit_answer(
    state: &SharedState,
    code: &str,
    request: SubmitAnswerRequest,
) -> Result<(), ServiceError> {
    let session = resolve_session(state, code).await?;
    require_in_progress(&session)?;
    let participant = authenticate(state, &session, &request.token).await?;

    if let Some(question) = state
        .store()
        .find_question(session.id, session.current_round, session.current_question)
        .await?
    {
        if request.answer_index >= question.options.len() {
            return Err(ServiceError::InvalidInput(format!(
                "answer index {} is out of range",
                request.answer_index
            )));
        }
    }

    state
        .store()
        .record_answer(AnswerEntity {
            session_id: session.id,
            participant_id: participant.id,
            round_number: session.current_round,
            question_number: session.current_question,
            submitted_at: SystemTime::now(),
            answer_index: Some(request.answer_index),
            correct: None,
            buzz_order: None,
        })
        .await?;

    Ok(())
}

/// Host grades an answer and applies the score delta.
pub async fn grade_answer(
    state: &SharedState,
    code: &str,
    request: GradeAnswerRequest,
) -> Result<ParticipantSummary, ServiceError> {
    let session = resolve_session(state, code).await?;
    require_host(&session, &request.host_token)?;

    state
        .store()
        .set_answer_correct(
            session.id,
            request.participant_id,
            request.round,
            request.question,
            request.correct,
        )
        .await?;

    let participant = if request.correct && (request.points != 0 || request.bonus != 0) {
        state
            .store()
            .add_score(
                session.id,
                request.participant_id,
                request.points,
                request.bonus,
            )
            .await?
    } else {
        state
            .store()
            .list_participants(session.id)
            .await?
            .into_iter()
            .find(|participant| participant.id == request.participant_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "participant `{}` not found",
                    request.participant_id
                ))
            })?
    };

    Ok(participant.into())
}

fn require_in_progress(session: &SessionEntity) -> Result<(), ServiceError> {
    if session.status != SessionStatus::InProgress {
        return Err(ServiceError::InvalidState(format!(
            "session is not accepting plays (status {:?})",
            session.status
        )));
    }
    Ok(())
}

async fn authenticate(
    state: &SharedState,
    session: &SessionEntity,
    token: &str,
) -> Result<ParticipantEntity, ServiceError> {
    state
        .store()
        .find_participant_by_token(session.id, token.to_string())
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("unknown participant token".into()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::models::GameVariant,
        dao::session_store::memory::MemoryStore,
        dto::session::{CreateSessionRequest, JoinSessionRequest, TransitionRequest},
        services::{collaborators::Collaborators, session_service},
        state::AppState,
    };

    struct Fixture {
        state: SharedState,
        code: String,
        host_token: String,
    }

    async fn in_progress_session() -> Fixture {
        let state = AppState::new(
            Arc::new(MemoryStore::new()),
            Collaborators::builtin(),
            AppConfig::default(),
        );
        let created = session_service::create_session(
            &state,
            CreateSessionRequest {
                variant: GameVariant::Quiz,
                total_rounds: 1,
                questions_per_round: 3,
                halftime_before_rounds: vec![],
            },
        )
        .await
        .unwrap();
        let code = created.session.code.clone();
        for status in [
            SessionStatus::Voting,
            SessionStatus::Ready,
            SessionStatus::InProgress,
        ] {
            session_service::transition(
                &state,
                &code,
                TransitionRequest {
                    host_token: created.host_token.clone(),
                    status,
                },
            )
            .await
            .unwrap();
        }
        Fixture {
            state,
            code,
            host_token: created.host_token,
        }
    }

    async fn join(fixture: &Fixture, name: &str) -> (uuid::Uuid, String) {
        let joined = session_service::join_session(
            &fixture.state,
            &fixture.code,
            JoinSessionRequest { name: name.into() },
        )
        .await
        .unwrap();
        (joined.participant_id, joined.token)
    }

    #[tokio::test]
    async fn simultaneous_buzzes_get_rank_one_and_two() {
        let fixture = in_progress_session().await;
        let (_, token_a) = join(&fixture, "Team A").await;
        let (_, token_b) = join(&fixture, "Team B").await;

        let state_a = fixture.state.clone();
        let state_b = fixture.state.clone();
        let code_a = fixture.code.clone();
        let code_b = fixture.code.clone();
        let (a, b) = tokio::join!(
            tokio::spawn(async move {
                claim_buzz(&state_a, &code_a, BuzzRequest { token: token_a })
                    .await
                    .unwrap()
            }),
            tokio::spawn(async move {
                claim_buzz(&state_b, &code_b, BuzzRequest { token: token_b })
                    .await
                    .unwrap()
            }),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        let mut orders = [a.order, b.order];
        orders.sort_unstable();
        assert_eq!(orders, [1, 2]);
        assert!(!a.already_claimed);
        assert!(!b.already_claimed);
    }

    #[tokio::test]
    async fn reclaim_is_flagged_and_stable() {
        let fixture = in_progress_session().await;
        let (_, token) = join(&fixture, "Team A").await;

        let first = claim_buzz(
            &fixture.state,
            &fixture.code,
            BuzzRequest {
                token: token.clone(),
            },
        )
        .await
        .unwrap();
        let second = claim_buzz(&fixture.state, &fixture.code, BuzzRequest { token })
            .await
            .unwrap();

        assert_eq!(first.order, second.order);
        assert!(!first.already_claimed);
        assert!(second.already_claimed);
    }

    #[tokio::test]
    async fn buzz_requires_valid_token_and_active_play() {
        let fixture = in_progress_session().await;
        let err = claim_buzz(
            &fixture.state,
            &fixture.code,
            BuzzRequest {
                token: "bogus".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn grading_a_correct_answer_awards_points() {
        let fixture = in_progress_session().await;
        let (participant_id, token) = join(&fixture, "Team A").await;

        submit_answer(
            &fixture.state,
            &fixture.code,
            SubmitAnswerRequest {
                token,
                answer_index: 1,
            },
        )
        .await
        .unwrap();

        let summary = grade_answer(
            &fixture.state,
            &fixture.code,
            GradeAnswerRequest {
                host_token: fixture.host_token.clone(),
                participant_id,
                round: 1,
                question: 1,
                correct: true,
                points: 10,
                bonus: 2,
            },
        )
        .await
        .unwrap();

        assert_eq!(summary.score, 10);
        assert_eq!(summary.bonus, 2);
    }

    #[tokio::test]
    async fn double_submission_is_rejected() {
        let fixture = in_progress_session().await;
        let (_, token) = join(&fixture, "Team A").await;

        submit_answer(
            &fixture.state,
            &fixture.code,
            SubmitAnswerRequest {
                token: token.clone(),
                answer_index: 0,
            },
        )
        .await
        .unwrap();

        let err = submit_answer(
            &fixture.state,
            &fixture.code,
            SubmitAnswerRequest {
                token,
                answer_index: 2,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }
}
