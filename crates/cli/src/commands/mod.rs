//! Command handlers for the TechAssist CLI.
//!
//! Each subcommand lives in its own module; the helpers below build the
//! backends every command shares from the resolved configuration.

pub mod ask;
pub mod chat;
pub mod dataset;
pub mod knowledge;

pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use dataset::DatasetCommand;
pub use knowledge::KnowledgeCommand;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use techassist_agents::{SessionSettings, SupportSession};
use techassist_core::{config::AppConfig, AppResult};
use techassist_knowledge::{open_index, KnowledgeIndex};
use techassist_llm::{create_client, LlmClient};
use techassist_prompt::PromptCatalog;

/// Text-generation client for the configured provider.
pub(crate) fn llm_client(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    config.validate()?;
    let endpoint = config.provider_endpoint(&config.provider);
    let api_key = config.resolve_api_key(&config.provider);
    create_client(&config.provider, endpoint.as_deref(), api_key.as_deref())
}

/// The workspace's persisted knowledge index.
pub(crate) fn knowledge_index(config: &AppConfig, base: Option<&str>) -> AppResult<KnowledgeIndex> {
    let base = base.unwrap_or(&config.agents.knowledge_base);
    open_index(&config.workspace, base)
}

/// Open a support session whose specialist is ready to answer.
pub(crate) async fn open_session(
    config: &AppConfig,
    data: Option<&Path>,
) -> AppResult<SupportSession> {
    let client = llm_client(config)?;
    let index = Arc::new(knowledge_index(config, None)?);

    let mut settings = SessionSettings::new(config.triage_model(), config.specialist_model());
    settings.agent_name = config.agents.agent_name.clone();
    settings.prompts = PromptCatalog::for_workspace(&config.workspace);

    let session = SupportSession::open(client, index, settings);
    let data_folder = data_folder(config, data);
    session.prepare_knowledge(&data_folder).await?;
    Ok(session)
}

/// `--data` when given, otherwise the configured corpus folder.
pub(crate) fn data_folder(config: &AppConfig, data: Option<&Path>) -> PathBuf {
    data.map(Path::to_path_buf)
        .unwrap_or_else(|| config.data_folder())
}
