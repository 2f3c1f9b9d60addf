//! Change-detection SSE broadcaster.
//!
//! There is no in-process pub/sub: each connection runs its own poll loop
//! against the shared store and compares every observation with the shadow
//! copy of what it last sent. Instances stay stateless, so any replica can
//! serve any stream.

use std::{convert::Infallible, sync::Arc, time::Duration, time::SystemTime};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::StreamExt;

use crate::{
    config::StreamSettings,
    dao::models::{GenerationProgressEntity, SessionStatus},
    dao::session_store::SessionStore,
    dao::storage::StorageResult,
    dto::{
        common::{GenerationProgressDto, PositionDto},
        format_system_time,
        sse::{
            AnswerCountEvent, ConnectedEvent, EndedEvent, ErrorEvent, GenerationCompleteEvent,
            GenerationProgressEvent, ParticipantCountEvent, PositionEvent, ServerEvent,
            StatusEvent, TimeoutEvent,
        },
    },
};

/// Which view of the session a connection subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRole {
    /// Public view shared by players and projection screens.
    Participant,
    /// Host view; additionally reports answer counts for the current question.
    Host,
}

impl StreamRole {
    fn as_str(self) -> &'static str {
        match self {
            StreamRole::Participant => "participant",
            StreamRole::Host => "host",
        }
    }
}

/// One store read's worth of observable session state.
struct Observation {
    status: SessionStatus,
    position: PositionDto,
    question_started_at: Option<SystemTime>,
    progress: Option<GenerationProgressEntity>,
    participants: u64,
    answers: Option<u64>,
}

/// Last-sent values per observable field. `None` means "never sent", so the
/// first observation always emits the full snapshot.
#[derive(Default)]
struct Shadow {
    status: Option<SessionStatus>,
    position: Option<(PositionDto, Option<SystemTime>)>,
    progress: Option<GenerationProgressEntity>,
    participants: Option<u64>,
    answers: Option<(PositionDto, u64)>,
}

impl Shadow {
    /// Compare an observation against the shadow, emit events for every field
    /// that moved, and absorb the new values.
    fn diff(&mut self, observation: &Observation) -> Vec<ServerEvent> {
        let mut events = Vec::new();

        if self.status != Some(observation.status) {
            self.status = Some(observation.status);
            events.push(emit(
                "status",
                &StatusEvent {
                    status: observation.status,
                },
            ));
        }

        let position = (observation.position, observation.question_started_at);
        if self.position != Some(position) {
            self.position = Some(position);
            events.push(emit(
                "position",
                &PositionEvent {
                    position: observation.position,
                    question_started_at: observation.question_started_at.map(format_system_time),
                },
            ));
        }

        if let Some(progress) = &observation.progress {
            if self.progress.as_ref() != Some(progress) {
                self.progress = Some(progress.clone());
                events.push(emit(
                    "generation_progress",
                    &GenerationProgressEvent(GenerationProgressDto::from(progress.clone())),
                ));
            }
        }

        if self.participants != Some(observation.participants) {
            self.participants = Some(observation.participants);
            events.push(emit(
                "participant_count",
                &ParticipantCountEvent {
                    participants: observation.participants,
                },
            ));
        }

        if let Some(answers) = observation.answers {
            let keyed = (observation.position, answers);
            if self.answers != Some(keyed) {
                self.answers = Some(keyed);
                events.push(emit(
                    "answer_count",
                    &AnswerCountEvent {
                        round: observation.position.round,
                        question: observation.position.question,
                        answers,
                    },
                ));
            }
        }

        events
    }
}

/// Raw event loop for one stream connection.
///
/// Yields `connected` first, then change events as the poll loop detects
/// them. The loop terminates on its own in exactly four cases: the lifetime
/// ceiling (`timeout`), generation progress reaching 100
/// (`generation_complete`), the session going terminal (`ended`), or a store
/// failure (`error`). Everything else is the client's disconnect.
pub fn event_stream(
    store: Arc<dyn SessionStore>,
    settings: StreamSettings,
    code: String,
    role: StreamRole,
) -> impl Stream<Item = ServerEvent> + Send {
    async_stream::stream! {
        yield emit(
            "connected",
            &ConnectedEvent {
                code: code.clone(),
                role: role.as_str().to_string(),
                message: format!("subscribed to session {code}"),
            },
        );

        let deadline = Instant::now() + settings.max_lifetime;
        let mut ticker = tokio::time::interval(settings.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shadow = Shadow::default();

        loop {
            if Instant::now() >= deadline {
                yield emit(
                    "timeout",
                    &TimeoutEvent {
                        message: "stream lifetime reached, please reconnect".to_string(),
                    },
                );
                break;
            }
            ticker.tick().await;

            let observation = match observe(&store, &code, role).await {
                Ok(Some(observation)) => observation,
                Ok(None) => {
                    yield emit(
                        "error",
                        &ErrorEvent {
                            message: format!("session {code} no longer exists"),
                        },
                    );
                    break;
                }
                Err(err) => {
                    yield emit(
                        "error",
                        &ErrorEvent {
                            message: err.to_string(),
                        },
                    );
                    break;
                }
            };

            let generation_done =
                observation.progress.as_ref().map(|p| p.percent) == Some(100);
            let ended = observation.status.is_terminal();

            for event in shadow.diff(&observation) {
                yield event;
            }

            if generation_done {
                yield emit(
                    "generation_complete",
                    &GenerationCompleteEvent {
                        message: "question generation finished".to_string(),
                    },
                );
                break;
            }
            if ended {
                yield emit(
                    "ended",
                    &EndedEvent {
                        status: observation.status,
                    },
                );
                break;
            }

            // Keeps the transport flushing between change events.
            yield ServerEvent::heartbeat();
        }
    }
}

/// Wrap a raw event loop into an axum SSE response with proxy keepalives.
pub fn to_sse<S>(stream: S, keepalive: Duration) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = ServerEvent> + Send + 'static,
{
    let events = stream.map(|event| {
        if event.is_heartbeat() {
            return Ok(Event::default().comment("tick"));
        }
        let mut sse = Event::default().data(event.data);
        if let Some(name) = event.event {
            sse = sse.event(name);
        }
        Ok(sse)
    });
    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(keepalive)
            .text("keep-alive"),
    )
}

/// One poll against the store. `Ok(None)` means the session is gone.
async fn observe(
    store: &Arc<dyn SessionStore>,
    code: &str,
    role: StreamRole,
) -> StorageResult<Option<Observation>> {
    let Some(session) = store.find_session_by_code(code.to_string()).await? else {
        return Ok(None);
    };
    let participants = store.count_participants(session.id).await?;
    let answers = match role {
        StreamRole::Host => Some(
            store
                .count_answers(session.id, session.current_round, session.current_question)
                .await?,
        ),
        StreamRole::Participant => None,
    };
    Ok(Some(Observation {
        status: session.status,
        position: PositionDto {
            round: session.current_round,
            question: session.current_question,
        },
        question_started_at: session.question_started_at,
        progress: session.generation_progress,
        participants,
        answers,
    }))
}

/// Serialize a payload into a named event. Serialization of these payloads
/// cannot fail in practice; if it ever does the failure is surfaced in-band.
fn emit<T: Serialize>(event: &str, payload: &T) -> ServerEvent {
    ServerEvent::json(event, payload).unwrap_or_else(|err| {
        ServerEvent::new(
            Some("error".to_string()),
            format!("{{\"message\":\"event serialization failed: {err}\"}}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::models::GameVariant,
        dao::session_store::memory::MemoryStore,
        dto::session::{
            CreateSessionRequest, JoinSessionRequest, SubmitAnswerRequest, TransitionRequest,
        },
        services::{buzz_service, collaborators::Collaborators, session_service},
        state::{AppState, SharedState},
    };

    fn fast_settings() -> StreamSettings {
        StreamSettings {
            tick: Duration::from_millis(5),
            keepalive: Duration::from_secs(30),
            max_lifetime: Duration::from_secs(5),
        }
    }

    fn test_state() -> SharedState {
        AppState::new(
            Arc::new(MemoryStore::new()),
            Collaborators::builtin(),
            AppConfig::default(),
        )
    }

    async fn quiz(state: &SharedState, rounds: u32, questions: u32) -> (String, String) {
        let created = session_service::create_session(
            state,
            CreateSessionRequest {
                variant: GameVariant::Quiz,
                total_rounds: rounds,
                questions_per_round: questions,
                halftime_before_rounds: vec![],
            },
        )
        .await
        .unwrap();
        (created.session.code, created.host_token)
    }

    async fn collect_all(
        stream: impl Stream<Item = ServerEvent> + Send,
    ) -> Vec<ServerEvent> {
        timeout(Duration::from_secs(10), stream.collect::<Vec<_>>())
            .await
            .expect("stream did not terminate")
    }

    fn names(events: &[ServerEvent]) -> Vec<&str> {
        events
            .iter()
            .map(|event| event.event.as_deref().unwrap_or(""))
            .collect()
    }

    #[tokio::test]
    async fn connection_opens_with_connected_then_snapshot() {
        let state = test_state();
        let (code, _) = quiz(&state, 1, 1).await;

        let mut stream = Box::pin(event_stream(
            state.store(),
            fast_settings(),
            code,
            StreamRole::Participant,
        ));

        let first = stream.next().await.unwrap();
        assert_eq!(first.event.as_deref(), Some("connected"));
        let second = stream.next().await.unwrap();
        assert_eq!(second.event.as_deref(), Some("status"));
        let third = stream.next().await.unwrap();
        assert_eq!(third.event.as_deref(), Some("position"));
    }

    #[tokio::test]
    async fn terminal_session_ends_the_stream() {
        let state = test_state();
        let (code, host_token) = quiz(&state, 1, 1).await;
        for status in [
            SessionStatus::Voting,
            SessionStatus::Ready,
            SessionStatus::InProgress,
        ] {
            session_service::transition(
                &state,
                &code,
                TransitionRequest {
                    host_token: host_token.clone(),
                    status,
                },
            )
            .await
            .unwrap();
        }
        // Single question: one advance completes the session.
        session_service::advance(&state, &code, &host_token)
            .await
            .unwrap();

        let events = collect_all(event_stream(
            state.store(),
            fast_settings(),
            code,
            StreamRole::Participant,
        ))
        .await;

        assert_eq!(events.last().unwrap().event.as_deref(), Some("ended"));
        assert!(names(&events).contains(&"status"));
    }

    #[tokio::test]
    async fn progress_hundred_shortcuts_to_generation_complete() {
        let state = test_state();
        let (code, _) = quiz(&state, 1, 1).await;
        let session = session_service::resolve_session(&state, &code).await.unwrap();
        state
            .store()
            .update_session(
                session.id,
                Box::new(|session| {
                    session.set_generation_progress(100, "generation complete".into());
                    Ok(())
                }),
            )
            .await
            .unwrap();

        let events = collect_all(event_stream(
            state.store(),
            fast_settings(),
            code,
            StreamRole::Participant,
        ))
        .await;

        let names = names(&events);
        assert!(names.contains(&"generation_progress"));
        assert_eq!(*names.last().unwrap(), "generation_complete");
    }

    #[tokio::test]
    async fn unknown_code_reports_error_and_closes() {
        let state = test_state();
        let events = collect_all(event_stream(
            state.store(),
            fast_settings(),
            "NOSUCH".to_string(),
            StreamRole::Participant,
        ))
        .await;
        assert_eq!(names(&events), vec!["connected", "error"]);
    }

    #[tokio::test]
    async fn lifetime_ceiling_closes_with_timeout() {
        let state = test_state();
        let (code, _) = quiz(&state, 1, 1).await;
        let settings = StreamSettings {
            tick: Duration::from_millis(5),
            keepalive: Duration::from_secs(30),
            max_lifetime: Duration::from_millis(40),
        };

        let events = collect_all(event_stream(
            state.store(),
            settings,
            code,
            StreamRole::Participant,
        ))
        .await;

        assert_eq!(events.last().unwrap().event.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn host_stream_sees_answer_counts_participant_stream_does_not() {
        let state = test_state();
        let (code, host_token) = quiz(&state, 1, 2).await;
        let joined = session_service::join_session(
            &state,
            &code,
            JoinSessionRequest {
                name: "Team A".into(),
            },
        )
        .await
        .unwrap();
        for status in [
            SessionStatus::Voting,
            SessionStatus::Ready,
            SessionStatus::InProgress,
        ] {
            session_service::transition(
                &state,
                &code,
                TransitionRequest {
                    host_token: host_token.clone(),
                    status,
                },
            )
            .await
            .unwrap();
        }
        buzz_service::submit_answer(
            &state,
            &code,
            SubmitAnswerRequest {
                token: joined.token,
                answer_index: 0,
            },
        )
        .await
        .unwrap();

        let mut host = Box::pin(event_stream(
            state.store(),
            fast_settings(),
            code.clone(),
            StreamRole::Host,
        ));
        let mut saw_answer_count = false;
        for _ in 0..8 {
            let Ok(Some(event)) = timeout(Duration::from_secs(2), host.next()).await else {
                break;
            };
            if event.event.as_deref() == Some("answer_count") {
                assert!(event.data.contains("\"answers\":1"));
                saw_answer_count = true;
                break;
            }
        }
        assert!(saw_answer_count);

        let mut participant = Box::pin(event_stream(
            state.store(),
            fast_settings(),
            code,
            StreamRole::Participant,
        ));
        for _ in 0..6 {
            let Ok(Some(event)) = timeout(Duration::from_millis(100), participant.next()).await
            else {
                break;
            };
            assert_ne!(event.event.as_deref(), Some("answer_count"));
        }
    }

    #[tokio::test]
    async fn shadow_only_reports_changes() {
        let mut shadow = Shadow::default();
        let observation = Observation {
            status: SessionStatus::Registration,
            position: PositionDto {
                round: 1,
                question: 1,
            },
            question_started_at: None,
            progress: None,
            participants: 0,
            answers: None,
        };

        // First pass sends the full snapshot, second pass is silent.
        assert_eq!(shadow.diff(&observation).len(), 3);
        assert!(shadow.diff(&observation).is_empty());

        let moved = Observation {
            participants: 2,
            ..observation
        };
        let events = shadow.diff(&moved);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("participant_count"));
    }
}
