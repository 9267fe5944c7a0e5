//! Synthetic support corpus generation.
//!
//! Asks the text-generation backend for bilingual Q&A pairs per category and
//! question template, and writes them in the layout [`crate::ingest`] reads.

use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use techassist_core::{AppError, AppResult};
use techassist_llm::{LlmClient, LlmRequest};
use techassist_prompt::PromptCatalog;

/// Prompt used for every generation call.
pub const DATASET_PROMPT_ID: &str = "dataset.generate";

/// Categories and their inspiration templates; `{software}` is substituted.
pub const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "installation",
        &[
            "How do I install {software} on {os}?",
            "I'm getting an error '{error_message}' while installing {software}.",
        ],
    ),
    (
        "configuration",
        &[
            "How can I configure {software} to {action}?",
            "What is the best way to set up {software} for {use_case}?",
        ],
    ),
    (
        "feature_inquiries",
        &[
            "Does {software} support {feature}?",
            "How does {software} handle {feature}?",
        ],
    ),
    (
        "bug_reports",
        &[
            "I'm experiencing {issue} when I {action} in {software}.",
            "There's a bug with {feature} in {software}; can you help?",
        ],
    ),
    (
        "performance_issues",
        &[
            "Why is {software} running slow on my {device}?",
            "How can I improve the performance of {software} when {action}?",
        ],
    ),
];

/// Outcome of a generation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationStats {
    pub files_written: usize,
    pub failed: usize,
}

#[derive(Serialize)]
struct GenerationPrompt<'a> {
    count: usize,
    software: &'a str,
    category: &'a str,
    template: String,
}

/// Batch generator for the bilingual support corpus.
pub struct DatasetGenerator {
    client: Arc<dyn LlmClient>,
    model: String,
    prompts: PromptCatalog,
    software: String,
    pairs_per_file: usize,
}

impl DatasetGenerator {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            prompts: PromptCatalog::builtin(),
            software: "MyApp".to_string(),
            pairs_per_file: 10,
        }
    }

    /// Product the questions are about.
    pub fn with_software(mut self, software: impl Into<String>) -> Self {
        self.software = software.into();
        self
    }

    pub fn with_prompts(mut self, prompts: PromptCatalog) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_pairs_per_file(mut self, count: usize) -> Self {
        self.pairs_per_file = count.max(1);
        self
    }

    /// Generate every category into `output`.
    ///
    /// Only a failure to create directories aborts the run; a bad generation
    /// is logged and counted in [`GenerationStats::failed`].
    pub async fn generate(&self, output: &Path) -> AppResult<GenerationStats> {
        tracing::info!(
            "Generating synthetic dataset for {} into {:?}",
            self.software,
            output
        );
        fs::create_dir_all(output)?;

        let mut stats = GenerationStats::default();

        for (category, templates) in CATEGORIES {
            let category_dir = output.join(category);
            fs::create_dir_all(&category_dir)?;

            for (i, template) in templates.iter().enumerate() {
                let number = i + 1;
                tracing::info!("Generating {} template {}", category, number);

                match self.generate_one(category, template).await {
                    Ok(data) => {
                        let path = category_dir.join(format!("questions_{}.json", number));
                        let body = serde_json::to_string_pretty(&data)?;
                        fs::write(&path, body)?;
                        tracing::info!("Saved questions to {:?}", path);
                        stats.files_written += 1;
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to generate data for {} template {}: {}",
                            category,
                            number,
                            e
                        );
                        stats.failed += 1;
                    }
                }
            }
        }

        tracing::info!(
            "Dataset generation finished: {} files written, {} failed",
            stats.files_written,
            stats.failed
        );
        Ok(stats)
    }

    async fn generate_one(&self, category: &str, template: &str) -> AppResult<Value> {
        let prompt = self.prompts.render(
            DATASET_PROMPT_ID,
            &GenerationPrompt {
                count: self.pairs_per_file,
                software: &self.software,
                category,
                template: template.replace("{software}", &self.software),
            },
        )?;

        let mut request = LlmRequest::new(prompt.user, &self.model).with_json_output();
        if let Some(system) = prompt.system {
            request = request.with_system(system);
        }
        if let Some(temperature) = prompt.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = prompt.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let response = self.client.complete(&request).await?;
        let data: Value = serde_json::from_str(response.content.trim())?;

        let complete = data
            .as_object()
            .map(|o| o.contains_key("EN") && o.contains_key("FR"))
            .unwrap_or(false);
        if !complete {
            return Err(AppError::Other(
                "generated data is missing the EN or FR section".to_string(),
            ));
        }

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ingest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use techassist_llm::{LlmResponse, LlmUsage};
    use tempfile::TempDir;

    /// Replies with `replies[n % len]` to the n-th call and records prompts.
    struct ScriptedClient {
        replies: Vec<String>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedClient {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: replies.iter().map(|r| r.to_string()).collect(),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedClient {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(request.clone());
            Ok(LlmResponse {
                content: self.replies[n % self.replies.len()].clone(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
                done: true,
            })
        }
    }

    const GOOD: &str = r#"{"EN": [{"question": "How do I install?", "answer": "Run setup."}],
                          "FR": [{"question": "Comment installer ?", "answer": "Lancez setup."}]}"#;

    #[tokio::test]
    async fn test_generates_ingestible_corpus() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(ScriptedClient::new(&[GOOD]));
        let generator = DatasetGenerator::new(client.clone(), "gpt-4o-mini").with_software("Acme");

        let stats = generator.generate(temp.path()).await.unwrap();
        assert_eq!(stats.files_written, 10);
        assert_eq!(stats.failed, 0);
        assert!(temp.path().join("bug_reports/questions_2.json").exists());

        let report = ingest(temp.path()).unwrap();
        assert_eq!(report.units.len(), 20);

        let prompts = client.prompts.lock().unwrap();
        let first = &prompts[0];
        assert!(first.format.is_some());
        assert_eq!(first.temperature, Some(1.0));
        let user = &first.messages.last().unwrap().content;
        assert!(user.contains("How do I install Acme on {os}?"));
        assert!(user.contains("installation"));
    }

    #[tokio::test]
    async fn test_invalid_generations_skipped() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(ScriptedClient::new(&[GOOD, r#"{"EN": []}"#, "not json"]));
        let generator = DatasetGenerator::new(client, "gpt-4o-mini");

        let stats = generator.generate(temp.path()).await.unwrap();
        assert_eq!(stats.files_written + stats.failed, 10);
        assert_eq!(stats.files_written, 4);
        assert!(temp.path().join("installation/questions_1.json").exists());
        assert!(!temp.path().join("installation/questions_2.json").exists());
    }
}
