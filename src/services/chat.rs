//! Retrieval-augmented question answering.
//!
//! A turn embeds the question, retrieves the nearest chunks and asks the chat
//! model to answer from them. The whole turn runs on its own task under a
//! wall-clock deadline; when the deadline passes the task is detached rather
//! than cancelled and the caller gets [`ChatError::Timeout`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::batch::BatchEmbedder;
use super::llm::ChatModel;
use super::vector_store::VectorStore;
use crate::error::ChatError;
use crate::models::{ChatConfig, ChatMessage, ChatTurn, RetrievedRecord};

pub const SYSTEM_PROMPT: &str = "You are a chatbot. You'll receive a prompt that includes a chat \
history and retrieved content from the document database based on the user's question. Your task \
is to respond to the user's question using the information from the retrieved content, relying as \
little as possible on your own knowledge. If for some reason you don't know the answer for the \
question, or the question cannot be answered because there's no context, ask the user for more \
details. Do not invent an answer. Answer the questions from this context: ";

/// System instruction for one turn: the fixed prompt followed by the
/// retrieved chunks separated by blank lines.
pub fn build_system_prompt(context: &[RetrievedRecord]) -> String {
    let joined = context
        .iter()
        .map(|r| r.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{SYSTEM_PROMPT}{joined}")
}

#[derive(Clone)]
pub struct ChatEngine {
    embedder: BatchEmbedder,
    store: Arc<dyn VectorStore>,
    model: Arc<dyn ChatModel>,
    top_k: u64,
    timeout: Duration,
}

impl ChatEngine {
    pub fn new(
        embedder: BatchEmbedder,
        store: Arc<dyn VectorStore>,
        model: Arc<dyn ChatModel>,
        config: &ChatConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            model,
            top_k: u64::from(config.top_k.max(1)),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn model(&self) -> &str {
        self.model.model()
    }

    /// Answer `question` given the prior conversation.
    pub async fn respond(
        &self,
        question: &str,
        history: &[ChatMessage],
    ) -> Result<ChatTurn, ChatError> {
        let start = Instant::now();

        let embedder = self.embedder.clone();
        let store = Arc::clone(&self.store);
        let model = Arc::clone(&self.model);
        let top_k = self.top_k;
        let owned_question = question.to_string();
        let history = history.to_vec();

        let handle = tokio::spawn(async move {
            run_turn(&embedder, store.as_ref(), model.as_ref(), top_k, &owned_question, &history)
                .await
        });

        let (answer, context) = match tokio::time::timeout(self.timeout, handle).await {
            Ok(Ok(result)) => result?,
            Ok(Err(e)) => return Err(ChatError::Transport(format!("chat task failed: {e}"))),
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "chat turn timed out");
                return Err(ChatError::Timeout(self.timeout));
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(
            context = context.len(),
            duration_ms, "answered question"
        );

        Ok(ChatTurn {
            question: question.to_string(),
            answer,
            context,
            duration_ms,
        })
    }
}

async fn run_turn(
    embedder: &BatchEmbedder,
    store: &dyn VectorStore,
    model: &dyn ChatModel,
    top_k: u64,
    question: &str,
    history: &[ChatMessage],
) -> Result<(String, Vec<RetrievedRecord>), ChatError> {
    let query_vector = embedder.embed_one(question).await?;
    let context = store.search(query_vector, top_k).await?;
    let system = build_system_prompt(&context);
    let answer = model.generate(&system, history, question).await?;
    Ok((answer, context))
}

/// What happened to a question asked in a session.
#[derive(Debug)]
pub enum TurnOutcome {
    /// Blank input; nothing was recorded.
    Ignored,
    Answered(ChatTurn),
    /// The error's user message was recorded as the AI reply.
    Failed(ChatError),
}

/// A conversation: the engine plus the running message history.
pub struct ChatSession {
    engine: ChatEngine,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(engine: ChatEngine) -> Self {
        Self {
            engine,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn engine(&self) -> &ChatEngine {
        &self.engine
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub async fn ask(&mut self, question: &str) -> TurnOutcome {
        let question = question.trim();
        if question.is_empty() {
            return TurnOutcome::Ignored;
        }

        // Recorded before the call so a failed turn still shows what was asked.
        self.history.push(ChatMessage::human(question));
        let prior = &self.history[..self.history.len() - 1];

        match self.engine.respond(question, prior).await {
            Ok(turn) => {
                self.history.push(ChatMessage::ai(turn.answer.clone()));
                TurnOutcome::Answered(turn)
            }
            Err(e) => {
                self.history.push(ChatMessage::ai(e.user_message()));
                TurnOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::Role;
    use crate::services::batch::tests::ScriptedProvider;
    use crate::services::reconcile::tests::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeModel {
        delay: Option<Duration>,
        fail_with: Option<fn() -> ChatError>,
        seen: Mutex<Vec<(String, Vec<ChatMessage>, String)>>,
    }

    #[async_trait]
    impl ChatModel for FakeModel {
        async fn generate(
            &self,
            system: &str,
            history: &[ChatMessage],
            question: &str,
        ) -> Result<String, ChatError> {
            self.seen.lock().unwrap().push((
                system.to_string(),
                history.to_vec(),
                question.to_string(),
            ));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            Ok(format!("answer to {question}"))
        }

        fn model(&self) -> &str {
            "models/fake"
        }
    }

    fn engine(provider: ScriptedProvider, model: Arc<FakeModel>) -> ChatEngine {
        let store = Arc::new(MemoryStore::with_sources(&[
            "docs/manual.pdf",
            "docs/warranty.pdf",
        ]));
        ChatEngine::new(
            BatchEmbedder::new(Arc::new(provider), 100),
            store,
            model,
            &ChatConfig::default(),
        )
    }

    #[test]
    fn test_system_prompt_joins_context() {
        let record = |content: &str| RetrievedRecord {
            id: String::new(),
            score: 1.0,
            content: content.to_string(),
            metadata: crate::models::ChunkMetadata {
                source: "docs/a.pdf".to_string(),
                page: 1,
            },
        };

        let prompt = build_system_prompt(&[record("first"), record("second")]);

        assert!(prompt.starts_with(SYSTEM_PROMPT));
        assert!(prompt.ends_with("first\n\nsecond"));
    }

    #[tokio::test]
    async fn test_respond_uses_retrieved_context() {
        let model = Arc::new(FakeModel::default());
        let engine = engine(ScriptedProvider::default(), model.clone());

        let turn = engine.respond("how long is the warranty?", &[]).await.unwrap();

        assert_eq!(turn.answer, "answer to how long is the warranty?");
        assert_eq!(turn.context.len(), 2);
        let seen = model.seen.lock().unwrap();
        assert!(seen[0].0.contains(&turn.context[0].content));
        assert_eq!(seen[0].2, "how long is the warranty?");
    }

    #[tokio::test]
    async fn test_respond_times_out() {
        let model = Arc::new(FakeModel {
            delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let engine =
            engine(ScriptedProvider::default(), model).with_timeout(Duration::from_millis(50));

        let start = Instant::now();
        let err = engine.respond("anything", &[]).await.unwrap_err();

        assert!(matches!(err, ChatError::Timeout(d) if d == Duration::from_millis(50)));
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_query_embedding_failure_propagates() {
        let provider = ScriptedProvider {
            fail_single: HashSet::from(["question".to_string()]),
            ..Default::default()
        };
        let model = Arc::new(FakeModel::default());
        let engine = engine(provider, model.clone());

        let err = engine.respond("question", &[]).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
        assert!(model.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_session_records_turns() {
        let model = Arc::new(FakeModel::default());
        let mut session = ChatSession::new(engine(ScriptedProvider::default(), model.clone()));

        assert!(matches!(session.ask("   ").await, TurnOutcome::Ignored));
        assert!(session.history().is_empty());

        assert!(matches!(session.ask("first?").await, TurnOutcome::Answered(_)));
        assert!(matches!(session.ask("second?").await, TurnOutcome::Answered(_)));

        let roles: Vec<Role> = session.history().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Human, Role::Ai, Role::Human, Role::Ai]);

        // The model sees prior turns but not the question twice.
        let seen = model.seen.lock().unwrap();
        assert!(seen[0].1.is_empty());
        assert_eq!(
            seen[1].1,
            vec![
                ChatMessage::human("first?"),
                ChatMessage::ai("answer to first?")
            ]
        );
    }

    #[tokio::test]
    async fn test_session_appends_quota_message() {
        let model = Arc::new(FakeModel {
            fail_with: Some(|| ChatError::QuotaExceeded("429".to_string())),
            ..Default::default()
        });
        let mut session = ChatSession::new(engine(ScriptedProvider::default(), model));

        let outcome = session.ask("question").await;

        let TurnOutcome::Failed(err) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[0], ChatMessage::human("question"));
        assert_eq!(session.history()[1].role, Role::Ai);
        assert!(session.history()[1].content.starts_with("Quota limit reached"));
    }

    #[tokio::test]
    async fn test_session_appends_timeout_message() {
        let model = Arc::new(FakeModel {
            delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let engine =
            engine(ScriptedProvider::default(), model).with_timeout(Duration::from_millis(20));
        let mut session = ChatSession::new(engine);

        let outcome = session.ask("question").await;

        assert!(matches!(outcome, TurnOutcome::Failed(ChatError::Timeout(_))));
        assert!(session.history()[1].content.starts_with("Request timed out"));
    }

    #[tokio::test]
    async fn test_session_appends_generic_message() {
        let model = Arc::new(FakeModel {
            fail_with: Some(|| ChatError::Transport("connection refused".to_string())),
            ..Default::default()
        });
        let mut session = ChatSession::new(engine(ScriptedProvider::default(), model));

        session.ask("question").await;

        let reply = &session.history()[1].content;
        assert!(reply.starts_with("Error generating response"));
        assert!(reply.contains("connection refused"));
    }
}
