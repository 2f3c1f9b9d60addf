//! Pure session lifecycle logic: the status adjacency table and the
//! position-advance algorithm. No I/O happens here; mutation services apply
//! the computed outcomes to the store, and broadcaster loops never call in.

use thiserror::Error;

use crate::dao::models::{GameVariant, SessionStatus};

/// Error returned when a requested status change is not in the adjacency table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {from:?} -> {to:?} is not allowed for the {variant:?} variant")]
pub struct InvalidTransition {
    /// Variant whose table was consulted.
    pub variant: GameVariant,
    /// Status the session was in.
    pub from: SessionStatus,
    /// Requested target status.
    pub to: SessionStatus,
}

/// Result of validating a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Target equals current status; always a no-op success.
    Identity,
    /// Legal move to the given status.
    Move(SessionStatus),
}

/// Status a freshly created session starts in.
pub fn initial_status(variant: GameVariant) -> SessionStatus {
    match variant {
        GameVariant::Quiz => SessionStatus::Registration,
        GameVariant::Lobby => SessionStatus::Lobby,
    }
}

/// Validate a status change against the variant's fixed adjacency table.
///
/// The identity transition is always accepted as a no-op; everything else not
/// listed in the table is a reportable error, never a silent no-op.
pub fn check_transition(
    variant: GameVariant,
    from: SessionStatus,
    to: SessionStatus,
) -> Result<Transition, InvalidTransition> {
    if from == to {
        return Ok(Transition::Identity);
    }
    if adjacent(variant, from, to) {
        Ok(Transition::Move(to))
    } else {
        Err(InvalidTransition { variant, from, to })
    }
}

fn adjacent(variant: GameVariant, from: SessionStatus, to: SessionStatus) -> bool {
    use SessionStatus::*;
    match variant {
        GameVariant::Quiz => matches!(
            (from, to),
            (Registration, Voting)
                | (Voting, Ready)
                | (Ready, InProgress)
                | (InProgress, Halftime)
                | (Halftime, InProgress)
                | (InProgress, Completed)
        ),
        GameVariant::Lobby => matches!((from, to), (Lobby, InProgress) | (InProgress, Completed)),
    }
}

/// Immutable view of the session fields the advance algorithm needs.
#[derive(Debug, Clone, Copy)]
pub struct AdvanceInput<'a> {
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Current round, 1-based.
    pub current_round: u32,
    /// Current question within the round, 1-based.
    pub current_question: u32,
    /// Total rounds in the session.
    pub total_rounds: u32,
    /// Questions per round.
    pub questions_per_round: u32,
    /// Rounds preceded by a halftime pause.
    pub halftime_before_rounds: &'a [u32],
}

/// What one "advance" call does to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceOutcome {
    /// Status after the advance.
    pub status: SessionStatus,
    /// Round after the advance.
    pub current_round: u32,
    /// Question after the advance.
    pub current_question: u32,
    /// Whether the countdown timestamp must be cleared.
    pub clear_question_started_at: bool,
    /// Round that finished as part of this advance, if any.
    pub completed_round: Option<u32>,
}

/// Error returned when the session cannot be advanced from its current status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot advance while session status is {0:?}")]
pub struct NotAdvanceable(pub SessionStatus);

/// Compute the effect of one "move to next" call.
///
/// A halftime session resumes without moving position; otherwise the question
/// pointer advances, rolling over into the next round (pausing at halftime
/// when the round is flagged) and finally into the terminal status.
pub fn plan_advance(input: AdvanceInput<'_>) -> Result<AdvanceOutcome, NotAdvanceable> {
    match input.status {
        SessionStatus::Halftime => Ok(AdvanceOutcome {
            status: SessionStatus::InProgress,
            current_round: input.current_round,
            current_question: input.current_question,
            clear_question_started_at: false,
            completed_round: None,
        }),
        SessionStatus::InProgress => {
            if input.current_question < input.questions_per_round {
                return Ok(AdvanceOutcome {
                    status: SessionStatus::InProgress,
                    current_round: input.current_round,
                    current_question: input.current_question + 1,
                    clear_question_started_at: true,
                    completed_round: None,
                });
            }

            // Round exhausted.
            let completed_round = Some(input.current_round);
            if input.current_round < input.total_rounds {
                let next_round = input.current_round + 1;
                let status = if input.halftime_before_rounds.contains(&next_round) {
                    SessionStatus::Halftime
                } else {
                    SessionStatus::InProgress
                };
                Ok(AdvanceOutcome {
                    status,
                    current_round: next_round,
                    current_question: 1,
                    clear_question_started_at: true,
                    completed_round,
                })
            } else {
                Ok(AdvanceOutcome {
                    status: SessionStatus::Completed,
                    current_round: input.current_round,
                    current_question: input.current_question,
                    clear_question_started_at: true,
                    completed_round,
                })
            }
        }
        other => Err(NotAdvanceable(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz_input(
        status: SessionStatus,
        round: u32,
        question: u32,
        halftime_before: &[u32],
    ) -> AdvanceInput<'_> {
        AdvanceInput {
            status,
            current_round: round,
            current_question: question,
            total_rounds: 2,
            questions_per_round: 10,
            halftime_before_rounds: halftime_before,
        }
    }

    #[test]
    fn identity_transition_is_noop_success() {
        let result =
            check_transition(GameVariant::Quiz, SessionStatus::Voting, SessionStatus::Voting);
        assert_eq!(result, Ok(Transition::Identity));
    }

    #[test]
    fn quiz_chain_is_enforced() {
        use SessionStatus::*;
        for (from, to) in [
            (Registration, Voting),
            (Voting, Ready),
            (Ready, InProgress),
            (InProgress, Halftime),
            (Halftime, InProgress),
            (InProgress, Completed),
        ] {
            assert_eq!(
                check_transition(GameVariant::Quiz, from, to),
                Ok(Transition::Move(to))
            );
        }

        let err = check_transition(GameVariant::Quiz, Registration, InProgress).unwrap_err();
        assert_eq!(err.from, Registration);
        assert_eq!(err.to, InProgress);
    }

    #[test]
    fn lobby_variant_cannot_use_quiz_statuses() {
        let err = check_transition(
            GameVariant::Lobby,
            SessionStatus::Lobby,
            SessionStatus::Voting,
        )
        .unwrap_err();
        assert_eq!(err.variant, GameVariant::Lobby);

        assert_eq!(
            check_transition(
                GameVariant::Lobby,
                SessionStatus::Lobby,
                SessionStatus::InProgress
            ),
            Ok(Transition::Move(SessionStatus::InProgress))
        );
    }

    #[test]
    fn completed_is_terminal() {
        use SessionStatus::*;
        for to in [Registration, Voting, Ready, InProgress, Halftime] {
            assert!(check_transition(GameVariant::Quiz, Completed, to).is_err());
        }
    }

    #[test]
    fn advance_moves_to_next_question_and_clears_countdown() {
        let outcome = plan_advance(quiz_input(SessionStatus::InProgress, 1, 3, &[])).unwrap();
        assert_eq!(outcome.current_round, 1);
        assert_eq!(outcome.current_question, 4);
        assert!(outcome.clear_question_started_at);
        assert_eq!(outcome.completed_round, None);
    }

    #[test]
    fn round_boundary_with_halftime_flag_pauses_at_new_round() {
        // Session at (1, 10), 10 questions per round, 2 rounds, round 2 flagged.
        let outcome = plan_advance(quiz_input(SessionStatus::InProgress, 1, 10, &[2])).unwrap();
        assert_eq!(outcome.status, SessionStatus::Halftime);
        assert_eq!(outcome.current_round, 2);
        assert_eq!(outcome.current_question, 1);
        assert_eq!(outcome.completed_round, Some(1));

        // Second advance resumes without moving position.
        let resume = plan_advance(quiz_input(SessionStatus::Halftime, 2, 1, &[2])).unwrap();
        assert_eq!(resume.status, SessionStatus::InProgress);
        assert_eq!(resume.current_round, 2);
        assert_eq!(resume.current_question, 1);
        assert_eq!(resume.completed_round, None);
    }

    #[test]
    fn last_round_exhaustion_completes_the_session() {
        let outcome = plan_advance(quiz_input(SessionStatus::InProgress, 2, 10, &[2])).unwrap();
        assert_eq!(outcome.status, SessionStatus::Completed);
        assert_eq!(outcome.completed_round, Some(2));
    }

    #[test]
    fn advance_rejected_outside_play() {
        for status in [
            SessionStatus::Registration,
            SessionStatus::Ready,
            SessionStatus::Completed,
        ] {
            assert!(plan_advance(quiz_input(status, 1, 1, &[])).is_err());
        }
    }

    #[test]
    fn session_completes_after_exactly_rounds_times_questions_advances() {
        let total_rounds = 3u32;
        let questions_per_round = 5u32;
        let halftime_before = [2u32, 3u32];

        let mut status = SessionStatus::InProgress;
        let mut round = 1u32;
        let mut question = 1u32;
        let mut position_advances = 0u32;

        while status != SessionStatus::Completed {
            let outcome = plan_advance(AdvanceInput {
                status,
                current_round: round,
                current_question: question,
                total_rounds,
                questions_per_round,
                halftime_before_rounds: &halftime_before,
            })
            .unwrap();

            // Halftime resumes are no-ops with respect to position.
            if status != SessionStatus::Halftime {
                position_advances += 1;
            } else {
                assert_eq!(outcome.current_round, round);
                assert_eq!(outcome.current_question, question);
            }
            assert!(outcome.current_round >= round);
            status = outcome.status;
            round = outcome.current_round;
            question = outcome.current_question;
        }

        assert_eq!(position_advances, total_rounds * questions_per_round);
    }
}
