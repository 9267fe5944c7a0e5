//! One support session: a router, its specialist, and the transcript.

use crate::memory::MemoryMessage;
use crate::responder::{Responder, SpecialistAgent};
use crate::router::{ConversationTurn, TriageAgent};
use crate::synthesis::LlmSynthesizer;
use crate::transcript::Transcript;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use techassist_core::{AppResult, SessionLogger};
use techassist_knowledge::KnowledgeIndex;
use techassist_llm::LlmClient;
use techassist_prompt::PromptCatalog;
use tokio::sync::Mutex;

/// Models and naming used to build a session's agents.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub agent_name: String,
    pub triage_model: String,
    pub specialist_model: String,
    pub prompts: PromptCatalog,
}

impl SessionSettings {
    pub fn new(triage_model: impl Into<String>, specialist_model: impl Into<String>) -> Self {
        Self {
            agent_name: "TechAssist".to_string(),
            triage_model: triage_model.into(),
            specialist_model: specialist_model.into(),
            prompts: PromptCatalog::builtin(),
        }
    }
}

pub struct SupportSession {
    id: String,
    router: TriageAgent,
    specialist: Arc<SpecialistAgent>,
    transcript: Mutex<Transcript>,
    logger: SessionLogger,
}

impl SupportSession {
    /// Open a session over a shared index. The specialist starts uninitialized.
    pub fn open(
        client: Arc<dyn LlmClient>,
        index: Arc<KnowledgeIndex>,
        settings: SessionSettings,
    ) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let logger = SessionLogger::open(id.clone());

        let synthesizer = LlmSynthesizer::new(client.clone(), settings.specialist_model)
            .with_prompts(settings.prompts.clone());
        let specialist = Arc::new(
            SpecialistAgent::new(index, Arc::new(synthesizer)).with_logger(logger.clone()),
        );

        let responder: Arc<dyn Responder> = specialist.clone();
        let router = TriageAgent::new(client, settings.triage_model)
            .with_name(settings.agent_name)
            .with_prompts(settings.prompts)
            .with_responder(responder)
            .with_logger(logger.clone());

        Self {
            id,
            router,
            specialist,
            transcript: Mutex::new(Transcript::new()),
            logger,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn router(&self) -> &TriageAgent {
        &self.router
    }

    pub fn specialist(&self) -> &Arc<SpecialistAgent> {
        &self.specialist
    }

    /// Make the specialist ready: reuse the index when it is already built,
    /// otherwise build it from `data_folder`.
    pub async fn prepare_knowledge(&self, data_folder: &Path) -> AppResult<()> {
        if self.specialist.attach_existing_index().await.is_ok() {
            return Ok(());
        }
        let report = self.specialist.initialize_knowledge_base(data_folder).await?;
        if !report.failures.is_empty() {
            self.logger.span().in_scope(|| {
                tracing::warn!("{} corpus file(s) could not be read", report.failures.len())
            });
        }
        Ok(())
    }

    /// Answer one query and record it in the transcript.
    pub async fn handle(&self, query: &str) -> String {
        let response = self.router.process_query(query).await;

        let mut transcript = self.transcript.lock().await;
        transcript.push(MemoryMessage::user(query));
        transcript.push(MemoryMessage::assistant(response.clone()));
        response
    }

    /// Clear the specialist's memory and the transcript. The router's log is kept.
    pub async fn reset(&self) {
        self.specialist.reset_conversation().await;
        self.transcript.lock().await.clear();
    }

    /// Continue a saved conversation: seeds the transcript and the specialist's memory.
    pub async fn resume(&self, transcript: Transcript) {
        self.specialist
            .restore_memory(transcript.messages().to_vec())
            .await;
        *self.transcript.lock().await = transcript;
    }

    pub async fn transcript(&self) -> Transcript {
        self.transcript.lock().await.clone()
    }

    pub async fn save_transcript(&self, dir: &Path) -> AppResult<PathBuf> {
        self.transcript.lock().await.save_to_dir(dir)
    }

    pub async fn history(&self) -> Vec<ConversationTurn> {
        self.router.conversation_history().await
    }

    /// End the session.
    pub async fn close(self) {
        let turns = self.router.conversation_history().await.len();
        self.logger.close(turns);
    }
}
