//! Configuration management for TechAssist.
//!
//! Configuration is layered, later sources winning:
//! - Built-in defaults
//! - Config file (`.techassist/config.yaml` or `TECHASSIST_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! All workspace state (indexes, prompts, logs) lives under `.techassist/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the LLM factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 2] = ["ollama", "openai"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .techassist/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Active LLM provider ("ollama" or "openai")
    pub provider: String,

    /// Default model identifier for the active provider
    pub model: String,

    /// API key for the LLM provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Also write logs to a daily file under `.techassist/logs/`
    pub log_to_file: bool,

    /// Agent pipeline settings
    pub agents: AgentsConfig,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::OpenAI { model, .. } | ProviderConfig::Ollama { model, .. } => model,
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ProviderConfig::OpenAI { endpoint, .. } => endpoint.as_deref(),
            ProviderConfig::Ollama { endpoint, .. } => Some(endpoint),
        }
    }
}

/// Settings for the triage router and the specialist responder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Model used for classification and direct answers; falls back to `model`
    #[serde(rename = "triageModel", default)]
    pub triage_model: Option<String>,

    /// Model used for retrieval-augmented answers; falls back to `model`
    #[serde(rename = "specialistModel", default)]
    pub specialist_model: Option<String>,

    /// Corpus root, relative to the workspace unless absolute
    #[serde(rename = "dataFolder", default = "default_data_folder")]
    pub data_folder: PathBuf,

    /// Logical name of the knowledge index
    #[serde(rename = "knowledgeBase", default = "default_knowledge_base")]
    pub knowledge_base: String,

    /// Where chat transcripts are saved, relative to the workspace unless absolute
    #[serde(rename = "transcriptsDir", default = "default_transcripts_dir")]
    pub transcripts_dir: PathBuf,

    /// Display name the triage agent introduces itself with
    #[serde(rename = "agentName", default = "default_agent_name")]
    pub agent_name: String,
}

fn default_data_folder() -> PathBuf {
    PathBuf::from("synthetic_data")
}

fn default_knowledge_base() -> String {
    "TechAssistDB".to_string()
}

fn default_transcripts_dir() -> PathBuf {
    PathBuf::from("chat_history")
}

fn default_agent_name() -> String {
    "TechAssist".to_string()
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            triage_model: None,
            specialist_model: None,
            data_folder: default_data_folder(),
            knowledge_base: default_knowledge_base(),
            transcripts_dir: default_transcripts_dir(),
            agent_name: default_agent_name(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    agents: Option<AgentsConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    file: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            log_to_file: false,
            agents: AgentsConfig::default(),
            llm: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, the config file and defaults.
    ///
    /// Environment variables:
    /// - `TECHASSIST_WORKSPACE`: Override workspace path
    /// - `TECHASSIST_CONFIG`: Path to config file
    /// - `TECHASSIST_PROVIDER`: LLM provider
    /// - `TECHASSIST_MODEL`: Model identifier
    /// - `TECHASSIST_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("TECHASSIST_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("TECHASSIST_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.workspace.join(".techassist/config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("TECHASSIST_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("TECHASSIST_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("TECHASSIST_API_KEY").ok();
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into a copy of this config.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(file) = logging.file {
                result.log_to_file = file;
            }
        }

        if let Some(agents) = config_file.agents {
            result.agents = agents;
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }

            result.llm = Some(llm);
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Path to the .techassist directory.
    pub fn state_dir(&self) -> PathBuf {
        self.workspace.join(".techassist")
    }

    /// Ensure the .techassist directory exists.
    pub fn ensure_state_dir(&self) -> AppResult<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .techassist directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Daily log file path used when file logging is enabled.
    pub fn log_file_path(&self) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d");
        self.state_dir()
            .join("logs")
            .join(format!("techassist_{}.log", stamp))
    }

    /// Resolve the corpus root against the workspace.
    pub fn data_folder(&self) -> PathBuf {
        self.resolve(&self.agents.data_folder)
    }

    /// Resolve the transcripts directory against the workspace.
    pub fn transcripts_dir(&self) -> PathBuf {
        self.resolve(&self.agents.transcripts_dir)
    }

    /// Model for the triage agent.
    pub fn triage_model(&self) -> &str {
        self.agents.triage_model.as_deref().unwrap_or(&self.model)
    }

    /// Model for the specialist agent.
    pub fn specialist_model(&self) -> &str {
        self.agents.specialist_model.as_deref().unwrap_or(&self.model)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Get the configuration for a provider, if the config file declares one.
    pub fn get_provider_config(&self, provider: &str) -> Option<ProviderConfig> {
        self.llm
            .as_ref()
            .and_then(|llm| llm.providers.get(provider).cloned())
    }

    /// Endpoint override for a provider, if configured.
    pub fn provider_endpoint(&self, provider: &str) -> Option<String> {
        self.get_provider_config(provider)
            .and_then(|pc| pc.endpoint().map(str::to_string))
    }

    /// Resolve the API key for a provider.
    ///
    /// `TECHASSIST_API_KEY` wins; otherwise the provider's `apiKeyEnv` is read.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        match self.get_provider_config(provider) {
            Some(ProviderConfig::OpenAI { api_key_env, .. }) => std::env::var(&api_key_env).ok(),
            _ => None,
        }
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.as_str();

        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if provider == "openai" && self.resolve_api_key(provider).is_none() {
            let hint = match self.get_provider_config(provider) {
                Some(ProviderConfig::OpenAI { api_key_env, .. }) => api_key_env,
                _ => "TECHASSIST_API_KEY".to_string(),
            };
            return Err(AppError::Config(format!(
                "API key not found in environment variable: {}",
                hint
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.agents.knowledge_base, "TechAssistDB");
        assert_eq!(config.agents.data_folder, PathBuf::from("synthetic_data"));
        assert!(!config.verbose);
        assert!(!config.no_color);
    }

    #[test]
    fn test_state_dir() {
        let config = AppConfig::default();
        assert!(config.state_dir().ends_with(".techassist"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some("openai".to_string()),
            Some("gpt-4o-mini".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.provider, "openai");
        assert_eq!(overridden.model, "gpt-4o-mini");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_agent_models_fall_back_to_default_model() {
        let mut config = AppConfig::default();
        assert_eq!(config.triage_model(), "llama3.2");
        config.agents.specialist_model = Some("mistral".to_string());
        assert_eq!(config.specialist_model(), "mistral");
        assert_eq!(config.triage_model(), "llama3.2");
    }

    #[test]
    fn test_relative_paths_resolve_against_workspace() {
        let mut config = AppConfig::default();
        config.workspace = PathBuf::from("/srv/support");
        assert_eq!(
            config.data_folder(),
            PathBuf::from("/srv/support/synthetic_data")
        );
        config.agents.transcripts_dir = PathBuf::from("/var/chats");
        assert_eq!(config.transcripts_dir(), PathBuf::from("/var/chats"));
    }

    #[test]
    fn test_merge_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
llm:
  activeProvider: ollama
  providers:
    ollama:
      endpoint: http://gpu-box:11434
      model: qwen2.5
agents:
  triageModel: llama3.2
  knowledgeBase: SupportKB
logging:
  level: warn
  color: false
"#,
        )
        .unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.provider, "ollama");
        assert_eq!(merged.model, "qwen2.5");
        assert_eq!(merged.triage_model(), "llama3.2");
        assert_eq!(merged.specialist_model(), "qwen2.5");
        assert_eq!(merged.agents.knowledge_base, "SupportKB");
        assert_eq!(merged.agents.data_folder, PathBuf::from("synthetic_data"));
        assert_eq!(merged.log_level, Some("warn".to_string()));
        assert!(merged.no_color);
        assert_eq!(
            merged.provider_endpoint("ollama"),
            Some("http://gpu-box:11434".to_string())
        );
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ollama() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_openai_with_explicit_key() {
        let mut config = AppConfig::default();
        config.provider = "openai".to_string();
        config.api_key = Some("sk-test".to_string());
        assert!(config.validate().is_ok());
    }
}
