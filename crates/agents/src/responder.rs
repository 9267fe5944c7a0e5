//! Retrieval-augmented specialist.
//!
//! The specialist answers escalated queries from the shared knowledge index
//! plus its own conversation memory. `get_response` never fails outward:
//! an uninitialized specialist or a synthesis failure yields a fixed apology.

use crate::memory::{MemoryBuffer, MemoryMessage};
use crate::synthesis::AnswerSynthesizer;
use std::path::Path;
use std::sync::Arc;
use techassist_core::{AppError, AppResult, SessionLogger};
use techassist_knowledge::{rebuild_from_corpus, IngestReport, KnowledgeIndex, RetrievedUnit};
use tokio::sync::{Mutex, RwLock};
use tracing::Instrument;

/// Units retrieved per query.
pub const RETRIEVAL_TOP_K: usize = 5;

pub const NOT_INITIALIZED_APOLOGY: &str =
    "I apologize, but I'm not able to access the technical knowledge base at the moment.";
pub const SYNTHESIS_FAILURE_APOLOGY: &str =
    "I apologize, but I encountered an error while processing your query.";

/// Something that can answer an escalated query.
///
/// An `Err` means the responder itself could not be reached; the caller
/// decides what the user sees.
#[async_trait::async_trait]
pub trait Responder: Send + Sync {
    async fn get_response(&self, query: &str) -> AppResult<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderState {
    Uninitialized,
    Ready,
}

/// Average relevance of the retrieved units, unscored units counting 0.5.
///
/// Advisory only: recorded per turn, never used to change the answer.
pub fn score_confidence(retrieved: &[RetrievedUnit]) -> f32 {
    if retrieved.is_empty() {
        return 0.0;
    }
    let total: f32 = retrieved
        .iter()
        .map(|r| r.relevance_score.unwrap_or(0.5))
        .sum();
    (total / retrieved.len() as f32).min(1.0)
}

pub struct SpecialistAgent {
    index: Arc<KnowledgeIndex>,
    synthesizer: Arc<dyn AnswerSynthesizer>,
    state: RwLock<ResponderState>,
    memory: Mutex<MemoryBuffer>,
    last_confidence: Mutex<Option<f32>>,
    logger: SessionLogger,
}

impl SpecialistAgent {
    pub fn new(index: Arc<KnowledgeIndex>, synthesizer: Arc<dyn AnswerSynthesizer>) -> Self {
        Self {
            index,
            synthesizer,
            state: RwLock::new(ResponderState::Uninitialized),
            memory: Mutex::new(MemoryBuffer::new()),
            last_confidence: Mutex::new(None),
            logger: SessionLogger::detached(),
        }
    }

    pub fn with_logger(mut self, logger: SessionLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn index(&self) -> &Arc<KnowledgeIndex> {
        &self.index
    }

    pub async fn state(&self) -> ResponderState {
        *self.state.read().await
    }

    pub async fn is_ready(&self) -> bool {
        self.state().await == ResponderState::Ready
    }

    /// Ingest `folder`, rebuild the index from it and become ready.
    ///
    /// An unreadable folder or a failed rebuild is returned and the state is
    /// left as it was.
    pub async fn initialize_knowledge_base(&self, folder: &Path) -> AppResult<IngestReport> {
        async {
            tracing::info!("Initializing knowledge base from {:?}", folder);
            let (report, stats) = rebuild_from_corpus(&self.index, folder).await?;
            *self.state.write().await = ResponderState::Ready;
            tracing::info!(
                "Specialist ready: generation {} with {} units",
                stats.generation,
                stats.units_indexed
            );
            Ok(report)
        }
        .instrument(self.logger.span())
        .await
    }

    /// Become ready on an index that is already built.
    pub async fn attach_existing_index(&self) -> AppResult<()> {
        if !self.index.is_ready().await {
            return Err(AppError::IndexUnavailable(format!(
                "'{}' has not been built",
                self.index.name()
            )));
        }
        *self.state.write().await = ResponderState::Ready;
        self.logger.span().in_scope(|| {
            tracing::info!("Specialist attached to existing index '{}'", self.index.name())
        });
        Ok(())
    }

    /// Forget the conversation; the index is untouched.
    pub async fn reset_conversation(&self) {
        self.memory.lock().await.clear();
        *self.last_confidence.lock().await = None;
        self.logger
            .span()
            .in_scope(|| tracing::info!("Specialist conversation reset"));
    }

    /// Replace the memory with previously recorded turns.
    pub async fn restore_memory(&self, messages: Vec<MemoryMessage>) {
        let mut memory = self.memory.lock().await;
        memory.clear();
        for message in messages {
            memory.push(message);
        }
    }

    pub async fn memory_snapshot(&self) -> Vec<MemoryMessage> {
        self.memory.lock().await.messages().to_vec()
    }

    /// Confidence recorded for the most recent answered turn.
    pub async fn last_confidence(&self) -> Option<f32> {
        *self.last_confidence.lock().await
    }

    async fn answer(&self, query: &str) -> String {
        if !self.is_ready().await {
            tracing::error!("Specialist queried before its knowledge base was initialized");
            return NOT_INITIALIZED_APOLOGY.to_string();
        }

        let retrieved = self.index.query(query, RETRIEVAL_TOP_K).await;
        let confidence = score_confidence(&retrieved);
        tracing::info!(
            "Retrieved {} units (confidence {:.2})",
            retrieved.len(),
            confidence
        );

        // Held for the whole turn so turns never interleave in memory.
        let mut memory = self.memory.lock().await;
        let history = memory.messages().to_vec();
        memory.push_user(query);

        match self.synthesizer.synthesize(query, &retrieved, &history).await {
            Ok(synthesis) => {
                memory.push_assistant(synthesis.answer.clone());
                *self.last_confidence.lock().await = Some(confidence);
                tracing::debug!("Answer drew on {} sources", synthesis.sources.len());
                synthesis.answer
            }
            Err(e) => {
                tracing::error!("Answer synthesis failed: {}", e);
                SYNTHESIS_FAILURE_APOLOGY.to_string()
            }
        }
    }
}

#[async_trait::async_trait]
impl Responder for SpecialistAgent {
    async fn get_response(&self, query: &str) -> AppResult<String> {
        Ok(self.answer(query).instrument(self.logger.span()).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::LlmSynthesizer;
    use crate::test_support::ScriptedClient;
    use std::fs;
    use techassist_knowledge::embeddings::providers::TrigramProvider;
    use techassist_knowledge::{Language, QaUnit};
    use tempfile::TempDir;

    fn scored(score: Option<f32>) -> RetrievedUnit {
        RetrievedUnit {
            unit: QaUnit {
                question: "q".to_string(),
                answer: "a".to_string(),
                language: Language::En,
                category: "installation".to_string(),
                source_id: "installation/q.json#EN:0".to_string(),
            },
            relevance_score: score,
        }
    }

    fn write_corpus(root: &Path) {
        let dir = root.join("installation");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("questions_1.json"),
            r#"{"EN": [
                {"question": "How do I install MyApp on Windows?", "answer": "Run MyAppSetup.exe."},
                {"question": "How do I install MyApp on macOS?", "answer": "Drag it to Applications."}
            ]}"#,
        )
        .unwrap();
    }

    fn specialist(client: Arc<ScriptedClient>) -> SpecialistAgent {
        let index = Arc::new(KnowledgeIndex::in_memory("kb", Arc::new(TrigramProvider::new(128))));
        SpecialistAgent::new(index, Arc::new(LlmSynthesizer::new(client, "gpt-4o-mini")))
    }

    #[test]
    fn test_score_confidence() {
        assert_eq!(score_confidence(&[]), 0.0);
        let avg = score_confidence(&[scored(Some(0.8)), scored(Some(0.4))]);
        assert!((avg - 0.6).abs() < 1e-6);
        assert_eq!(score_confidence(&[scored(None)]), 0.5);
        assert_eq!(score_confidence(&[scored(Some(1.0)), scored(Some(1.0))]), 1.0);
    }

    #[tokio::test]
    async fn test_uninitialized_returns_apology() {
        let client = Arc::new(ScriptedClient::replying(&["never used"]));
        let agent = specialist(client.clone());

        let reply = agent.get_response("How do I install?").await.unwrap();
        assert_eq!(reply, NOT_INITIALIZED_APOLOGY);
        assert!(client.requests().is_empty());
        assert!(agent.memory_snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_answers_and_records_memory() {
        let temp = TempDir::new().unwrap();
        write_corpus(temp.path());
        let client = Arc::new(ScriptedClient::replying(&[
            "Run MyAppSetup.exe.",
            "Yes, same installer.",
        ]));
        let agent = specialist(client.clone());

        let report = agent.initialize_knowledge_base(temp.path()).await.unwrap();
        assert_eq!(report.units.len(), 2);
        assert!(agent.is_ready().await);

        let first = agent.get_response("install on Windows").await.unwrap();
        assert_eq!(first, "Run MyAppSetup.exe.");
        assert!(agent.last_confidence().await.unwrap() > 0.0);

        agent.get_response("and on Windows 11?").await.unwrap();
        let memory = agent.memory_snapshot().await;
        assert_eq!(memory.len(), 4);
        assert_eq!(memory[2], MemoryMessage::user("and on Windows 11?"));

        // Second call carries the first turn as history.
        let request = client.last_request().unwrap();
        assert_eq!(request.messages.len(), 4);
    }

    #[tokio::test]
    async fn test_synthesis_failure_returns_apology() {
        let temp = TempDir::new().unwrap();
        write_corpus(temp.path());
        let agent = specialist(Arc::new(ScriptedClient::failing()));
        agent.initialize_knowledge_base(temp.path()).await.unwrap();

        let reply = agent.get_response("install").await.unwrap();
        assert_eq!(reply, SYNTHESIS_FAILURE_APOLOGY);
    }

    #[tokio::test]
    async fn test_reset_keeps_index_ready() {
        let temp = TempDir::new().unwrap();
        write_corpus(temp.path());
        let agent = specialist(Arc::new(ScriptedClient::replying(&["ok"])));
        agent.initialize_knowledge_base(temp.path()).await.unwrap();
        agent.get_response("install").await.unwrap();

        agent.reset_conversation().await;
        assert!(agent.memory_snapshot().await.is_empty());
        assert!(agent.last_confidence().await.is_none());
        assert!(agent.is_ready().await);
        assert_eq!(agent.get_response("install").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_missing_folder_leaves_uninitialized() {
        let temp = TempDir::new().unwrap();
        let agent = specialist(Arc::new(ScriptedClient::replying(&["ok"])));

        assert!(agent
            .initialize_knowledge_base(&temp.path().join("missing"))
            .await
            .is_err());
        assert_eq!(agent.state().await, ResponderState::Uninitialized);
    }

    #[tokio::test]
    async fn test_attach_requires_built_index() {
        let temp = TempDir::new().unwrap();
        write_corpus(temp.path());
        let first = specialist(Arc::new(ScriptedClient::replying(&["ok"])));
        assert!(matches!(
            first.attach_existing_index().await,
            Err(AppError::IndexUnavailable(_))
        ));

        first.initialize_knowledge_base(temp.path()).await.unwrap();
        let second = SpecialistAgent::new(
            first.index().clone(),
            Arc::new(LlmSynthesizer::new(Arc::new(ScriptedClient::replying(&["ok"])), "m")),
        );
        second.attach_existing_index().await.unwrap();
        assert!(second.is_ready().await);
    }
}
