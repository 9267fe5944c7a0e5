//! Triage router.
//!
//! Every query is classified, then either answered directly or handed to the
//! injected [`Responder`]. `process_query` always returns text: classifier,
//! generation and delegation failures each degrade to a fixed path.

use crate::analysis::QueryAnalysis;
use crate::responder::Responder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use techassist_core::{AppError, AppResult, SessionLogger};
use techassist_llm::{LlmClient, LlmRequest};
use techassist_prompt::{BuiltPrompt, PromptCatalog};
use tokio::sync::Mutex;
use tracing::Instrument;

pub const ANALYZE_PROMPT_ID: &str = "triage.analyze";
pub const DIRECT_PROMPT_ID: &str = "triage.direct";

pub const DIRECT_FAILURE_APOLOGY: &str =
    "I apologize, but I'm having trouble generating a response. Please try again.";
pub const DELEGATION_FAILURE_APOLOGY: &str =
    "I apologize, but I'm having trouble getting the technical information you need. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Direct,
    Escalated,
}

/// One entry of the router's decision log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub query: String,
    pub response: String,
    pub analysis: QueryAnalysis,
    pub route: Route,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct AnalyzePrompt<'a> {
    agent_name: &'a str,
    query: &'a str,
}

#[derive(Serialize)]
struct DirectPrompt<'a> {
    agent_name: &'a str,
    query: &'a str,
    category: &'a str,
    complexity: &'a str,
}

/// First-line agent deciding between answering and escalating.
pub struct TriageAgent {
    name: String,
    client: Arc<dyn LlmClient>,
    model: String,
    responder: Option<Arc<dyn Responder>>,
    prompts: PromptCatalog,
    logger: SessionLogger,
    turns: Mutex<Vec<ConversationTurn>>,
}

impl TriageAgent {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            name: "TechAssist".to_string(),
            client,
            model: model.into(),
            responder: None,
            prompts: PromptCatalog::builtin(),
            logger: SessionLogger::detached(),
            turns: Mutex::new(Vec::new()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Without a responder every query is answered directly.
    pub fn with_responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn with_prompts(mut self, prompts: PromptCatalog) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_logger(mut self, logger: SessionLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Classify a query; falls back to a high-risk analysis on any failure.
    pub async fn analyze(&self, query: &str) -> QueryAnalysis {
        match self.try_analyze(query).await {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!("Query analysis failed, escalating by default: {}", e);
                QueryAnalysis::fallback()
            }
        }
    }

    async fn try_analyze(&self, query: &str) -> AppResult<QueryAnalysis> {
        let prompt = self.prompts.render(
            ANALYZE_PROMPT_ID,
            &AnalyzePrompt {
                agent_name: &self.name,
                query,
            },
        )?;
        let request = self.request(prompt);

        let response = self
            .client
            .complete(&request)
            .await
            .map_err(|e| AppError::Analysis(e.to_string()))?;
        QueryAnalysis::parse(&response.content)
    }

    /// Route one query and return the text for the user.
    pub async fn process_query(&self, query: &str) -> String {
        self.route_query(query)
            .instrument(self.logger.span())
            .await
    }

    async fn route_query(&self, query: &str) -> String {
        tracing::info!("Processing query ({} chars)", query.chars().count());

        let analysis = self.analyze(query).await;
        tracing::info!(
            "Analysis: complexity={} category={} needs_expertise={} confidence={:.2}",
            analysis.complexity,
            analysis.category,
            analysis.needs_expertise,
            analysis.confidence
        );

        let (content, route) = match (&self.responder, analysis.should_escalate()) {
            (Some(responder), true) => {
                tracing::info!("Escalating to specialist");
                (self.delegate(responder.as_ref(), query).await, Route::Escalated)
            }
            (None, true) => {
                tracing::warn!(
                    "Escalation warranted but no specialist configured; answering directly"
                );
                (self.direct_answer(query, &analysis).await, Route::Direct)
            }
            (_, false) => {
                tracing::info!("Answering directly");
                (self.direct_answer(query, &analysis).await, Route::Direct)
            }
        };

        let response = format_response(&analysis, &content);

        self.turns.lock().await.push(ConversationTurn {
            query: query.to_string(),
            response: response.clone(),
            analysis,
            route,
            timestamp: Utc::now(),
        });

        response
    }

    async fn delegate(&self, responder: &dyn Responder, query: &str) -> String {
        match responder.get_response(query).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!("Specialist failed: {}", e);
                DELEGATION_FAILURE_APOLOGY.to_string()
            }
        }
    }

    async fn direct_answer(&self, query: &str, analysis: &QueryAnalysis) -> String {
        match self.try_direct_answer(query, analysis).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!("Direct answer failed: {}", e);
                DIRECT_FAILURE_APOLOGY.to_string()
            }
        }
    }

    async fn try_direct_answer(&self, query: &str, analysis: &QueryAnalysis) -> AppResult<String> {
        let prompt = self.prompts.render(
            DIRECT_PROMPT_ID,
            &DirectPrompt {
                agent_name: &self.name,
                query,
                category: analysis.category.describe(),
                complexity: analysis.complexity.as_str(),
            },
        )?;
        let request = self.request(prompt);

        let response = self
            .client
            .complete(&request)
            .await
            .map_err(|e| AppError::Synthesis(e.to_string()))?;

        let answer = response.content.trim();
        if answer.is_empty() {
            return Err(AppError::Synthesis("backend returned an empty answer".to_string()));
        }
        Ok(answer.to_string())
    }

    fn request(&self, prompt: BuiltPrompt) -> LlmRequest {
        tracing::debug!("Rendered prompt '{}'", prompt.source_prompt_id);

        let mut request = LlmRequest::new(prompt.user, &self.model);
        if let Some(system) = prompt.system {
            request = request.with_system(system);
        }
        if let Some(temperature) = prompt.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = prompt.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        if prompt.json_output {
            request = request.with_json_output();
        }
        request
    }

    /// Copy of the decision log, oldest first.
    pub async fn conversation_history(&self) -> Vec<ConversationTurn> {
        self.turns.lock().await.clone()
    }
}

/// Prefix `content` with an acknowledgement when the query needs expertise.
pub fn format_response(analysis: &QueryAnalysis, content: &str) -> String {
    if !analysis.needs_expertise {
        return content.to_string();
    }

    let opening = if analysis.keywords.is_empty() {
        "I understand your question.".to_string()
    } else {
        format!(
            "I understand your question about {}.",
            analysis.keywords.join(", ")
        )
    };

    format!(
        "{} This seems to be a {} issue that requires specific expertise. Let me consult with our technical expert.\n\n{}",
        opening,
        analysis.category.describe(),
        content
    )
}
