//! External collaborator contracts consumed by the background executors.
//!
//! All calls are single-shot, retryless, and fallible: a failure degrades or
//! fails the owning task, it is never retried here. The real question
//! authoring, rendering, and synthesis services live outside this crate; the
//! built-in implementations below back the binary and the test-suite.

use std::{fmt::Write as _, sync::Arc};

use dashmap::DashMap;
use futures::future::BoxFuture;
use thiserror::Error;

/// Error raised by any collaborator call.
#[derive(Debug, Error)]
#[error("collaborator call failed: {0}")]
pub struct CollaboratorError(pub String);

/// Result alias for collaborator calls.
pub type CollabResult<T> = Result<T, CollaboratorError>;

/// One structured question returned by the authoring collaborator.
#[derive(Debug, Clone)]
pub struct AuthoredQuestion {
    /// Question text.
    pub text: String,
    /// Answer options in display order.
    pub options: Vec<String>,
    /// Index into `options` of the correct answer.
    pub correct_index: usize,
    /// Optional trivia revealed after the question.
    pub fun_fact: Option<String>,
}

/// Parameters for authoring one round's worth of questions.
#[derive(Debug, Clone)]
pub struct RoundRequest {
    /// Round being authored, 1-based.
    pub round_number: u32,
    /// How many questions the round needs; must be positive.
    pub question_count: u32,
    /// Optional topic hint from the host.
    pub topic: Option<String>,
}

/// Question-authoring collaborator returning structured question objects.
pub trait QuestionAuthor: Send + Sync {
    /// Author a full round of questions.
    fn author_round(
        &self,
        request: RoundRequest,
    ) -> BoxFuture<'static, CollabResult<Vec<AuthoredQuestion>>>;
}

/// Document-rendering collaborator returning a byte stream.
pub trait DocumentRenderer: Send + Sync {
    /// Render a printable document from the given text content.
    fn render(&self, title: String, body: String) -> BoxFuture<'static, CollabResult<Vec<u8>>>;
}

/// Speech/music synthesis collaborator returning an audio byte stream.
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize spoken audio for the given text.
    fn synthesize(&self, text: String) -> BoxFuture<'static, CollabResult<Vec<u8>>>;
}

/// Object-storage collaborator returning a durable URL for uploaded bytes.
pub trait ObjectStore: Send + Sync {
    /// Upload bytes under a key and return the durable URL.
    fn put(&self, key: String, bytes: Vec<u8>) -> BoxFuture<'static, CollabResult<String>>;
}

/// Bundle of collaborator handles injected into the executors.
#[derive(Clone)]
pub struct Collaborators {
    /// Question authoring service.
    pub author: Arc<dyn QuestionAuthor>,
    /// Document rendering service.
    pub renderer: Arc<dyn DocumentRenderer>,
    /// Speech synthesis service.
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    /// Object storage service.
    pub objects: Arc<dyn ObjectStore>,
}

impl Collaborators {
    /// Built-in collaborator set used by the binary when no external services
    /// are configured, and by the test-suite.
    pub fn builtin() -> Self {
        Self {
            author: Arc::new(HouseAuthor),
            renderer: Arc::new(PlainTextRenderer),
            synthesizer: Arc::new(SilenceSynthesizer),
            objects: Arc::new(InMemoryObjects::default()),
        }
    }
}

/// Deterministic in-house question author producing placeholder pub-quiz
/// questions. Stands in for the AI authoring service.
pub struct HouseAuthor;

impl QuestionAuthor for HouseAuthor {
    fn author_round(
        &self,
        request: RoundRequest,
    ) -> BoxFuture<'static, CollabResult<Vec<AuthoredQuestion>>> {
        Box::pin(async move {
            if request.question_count == 0 {
                return Err(CollaboratorError("round needs at least one question".into()));
            }
            let topic = request.topic.unwrap_or_else(|| "general knowledge".into());
            let questions = (1..=request.question_count)
                .map(|number| AuthoredQuestion {
                    text: format!(
                        "Round {} question {number}: a {topic} teaser",
                        request.round_number
                    ),
                    options: vec![
                        "Option A".into(),
                        "Option B".into(),
                        "Option C".into(),
                        "Option D".into(),
                    ],
                    correct_index: ((request.round_number + number) % 4) as usize,
                    fun_fact: Some(format!("Fun fact for question {number}.")),
                })
                .collect();
            Ok(questions)
        })
    }
}

/// Renderer that emits the document as plain UTF-8 bytes.
pub struct PlainTextRenderer;

impl DocumentRenderer for PlainTextRenderer {
    fn render(&self, title: String, body: String) -> BoxFuture<'static, CollabResult<Vec<u8>>> {
        Box::pin(async move {
            let mut document = String::new();
            let _ = writeln!(document, "{title}");
            let _ = writeln!(document, "{}", "=".repeat(title.chars().count()));
            document.push_str(&body);
            Ok(document.into_bytes())
        })
    }
}

/// Synthesizer that returns an empty audio payload.
pub struct SilenceSynthesizer;

impl SpeechSynthesizer for SilenceSynthesizer {
    fn synthesize(&self, _text: String) -> BoxFuture<'static, CollabResult<Vec<u8>>> {
        Box::pin(async move { Ok(Vec::new()) })
    }
}

/// Object store keeping uploads in process memory, addressed as `mem://` URLs.
#[derive(Default)]
pub struct InMemoryObjects {
    blobs: DashMap<String, Vec<u8>>,
}

impl ObjectStore for InMemoryObjects {
    fn put(&self, key: String, bytes: Vec<u8>) -> BoxFuture<'static, CollabResult<String>> {
        self.blobs.insert(key.clone(), bytes);
        Box::pin(async move { Ok(format!("mem://{key}")) })
    }
}
