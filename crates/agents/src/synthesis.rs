//! Answer synthesis from retrieved knowledge and conversation history.

use crate::memory::MemoryMessage;
use serde::Serialize;
use std::sync::Arc;
use techassist_core::{AppError, AppResult};
use techassist_knowledge::{Language, RetrievedUnit};
use techassist_llm::{ChatMessage, LlmClient, LlmRequest};
use techassist_prompt::PromptCatalog;

pub const SPECIALIST_PROMPT_ID: &str = "specialist.answer";

/// A knowledge unit an answer drew on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub source_id: String,
    pub category: String,
    pub language: Language,
    pub relevance_score: Option<f32>,
}

impl From<&RetrievedUnit> for SourceRef {
    fn from(retrieved: &RetrievedUnit) -> Self {
        Self {
            source_id: retrieved.unit.source_id.clone(),
            category: retrieved.unit.category.clone(),
            language: retrieved.unit.language,
            relevance_score: retrieved.relevance_score,
        }
    }
}

/// Full synthesizer output. Only `answer` ever reaches the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Synthesis {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Produces an answer for a query given retrieved context and prior turns.
///
/// `history` holds the turns before the current query. Failures are
/// reported as `AppError::Synthesis`.
#[async_trait::async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        query: &str,
        context: &[RetrievedUnit],
        history: &[MemoryMessage],
    ) -> AppResult<Synthesis>;
}

#[derive(Serialize)]
struct ContextDocument<'a> {
    number: usize,
    category: &'a str,
    language: &'a str,
    question: &'a str,
    answer: &'a str,
}

#[derive(Serialize)]
struct AnswerPrompt<'a> {
    query: &'a str,
    documents: Vec<ContextDocument<'a>>,
}

/// Synthesizer backed by a text-generation model.
pub struct LlmSynthesizer {
    client: Arc<dyn LlmClient>,
    model: String,
    prompts: PromptCatalog,
}

impl LlmSynthesizer {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            prompts: PromptCatalog::builtin(),
        }
    }

    pub fn with_prompts(mut self, prompts: PromptCatalog) -> Self {
        self.prompts = prompts;
        self
    }

    fn build_request(
        &self,
        query: &str,
        context: &[RetrievedUnit],
        history: &[MemoryMessage],
    ) -> AppResult<LlmRequest> {
        let documents = context
            .iter()
            .enumerate()
            .map(|(i, retrieved)| ContextDocument {
                number: i + 1,
                category: &retrieved.unit.category,
                language: retrieved.unit.language.code(),
                question: &retrieved.unit.question,
                answer: &retrieved.unit.answer,
            })
            .collect();

        let prompt = self
            .prompts
            .render(SPECIALIST_PROMPT_ID, &AnswerPrompt { query, documents })?;

        let mut request = LlmRequest::new(prompt.user, &self.model)
            .with_history(history.iter().map(ChatMessage::from));
        if let Some(system) = prompt.system {
            request = request.with_system(system);
        }
        if let Some(temperature) = prompt.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = prompt.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        Ok(request)
    }
}

#[async_trait::async_trait]
impl AnswerSynthesizer for LlmSynthesizer {
    async fn synthesize(
        &self,
        query: &str,
        context: &[RetrievedUnit],
        history: &[MemoryMessage],
    ) -> AppResult<Synthesis> {
        let request = self
            .build_request(query, context, history)
            .map_err(|e| AppError::Synthesis(e.to_string()))?;

        tracing::debug!(
            "Synthesizing with {} context units, {} history messages, {} prompt chars",
            context.len(),
            history.len(),
            request.prompt_chars()
        );

        let response = self
            .client
            .complete(&request)
            .await
            .map_err(|e| AppError::Synthesis(e.to_string()))?;

        let answer = response.content.trim().to_string();
        if answer.is_empty() {
            return Err(AppError::Synthesis("backend returned an empty answer".to_string()));
        }

        Ok(Synthesis {
            answer,
            sources: context.iter().map(SourceRef::from).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedClient;
    use techassist_knowledge::QaUnit;
    use techassist_llm::ChatRole;

    fn retrieved(question: &str, answer: &str) -> RetrievedUnit {
        RetrievedUnit {
            unit: QaUnit {
                question: question.to_string(),
                answer: answer.to_string(),
                language: Language::Fr,
                category: "installation".to_string(),
                source_id: "installation/questions_1.json#FR:0".to_string(),
            },
            relevance_score: Some(0.8),
        }
    }

    #[tokio::test]
    async fn test_request_carries_context_and_history() {
        let client = Arc::new(ScriptedClient::replying(&["  Use the installer.  "]));
        let synthesizer = LlmSynthesizer::new(client.clone(), "gpt-4o-mini");

        let history = vec![
            MemoryMessage::user("Hi"),
            MemoryMessage::assistant("Hello!"),
        ];
        let synthesis = synthesizer
            .synthesize(
                "Comment installer ?",
                &[retrieved("Comment installer ?", "Lancez l'installeur.")],
                &history,
            )
            .await
            .unwrap();

        assert_eq!(synthesis.answer, "Use the installer.");
        assert_eq!(synthesis.sources.len(), 1);
        assert_eq!(synthesis.sources[0].relevance_score, Some(0.8));

        let request = client.last_request().unwrap();
        assert_eq!(request.temperature, Some(0.5));
        let roles: Vec<ChatRole> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![ChatRole::System, ChatRole::User, ChatRole::Assistant, ChatRole::User]
        );
        let user = &request.messages[3].content;
        assert!(user.contains("[Document 1] (installation, FR)"));
        assert!(user.contains("A: Lancez l'installeur."));
        assert!(user.contains("Question: Comment installer ?"));
    }

    #[tokio::test]
    async fn test_no_context_is_stated() {
        let client = Arc::new(ScriptedClient::replying(&["I don't know."]));
        let synthesizer = LlmSynthesizer::new(client.clone(), "m");
        synthesizer.synthesize("q", &[], &[]).await.unwrap();

        let request = client.last_request().unwrap();
        assert!(request.messages.last().unwrap().content.contains("(no relevant excerpts found)"));
    }

    #[tokio::test]
    async fn test_backend_failure_is_synthesis_error() {
        let client = Arc::new(ScriptedClient::failing());
        let synthesizer = LlmSynthesizer::new(client, "m");
        let result = synthesizer.synthesize("q", &[], &[]).await;
        assert!(matches!(result, Err(AppError::Synthesis(_))));
    }
}
