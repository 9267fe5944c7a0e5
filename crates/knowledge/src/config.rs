//! Knowledge base configuration management.

use crate::embeddings::EmbeddingConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use techassist_core::{AppError, AppResult};

/// Per-base configuration, stored next to the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    pub name: String,

    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

impl KnowledgeBaseConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

/// Load knowledge base configuration.
///
/// Loads from `.techassist/knowledge/<base>/config.yaml` if it exists,
/// otherwise returns a default config for `base_name`.
pub fn load_config(workspace: &Path, base_name: &str) -> AppResult<KnowledgeBaseConfig> {
    let config_path = get_config_path(workspace, base_name);

    if !config_path.exists() {
        tracing::debug!(
            "Using default knowledge base config for '{}' (no config file found)",
            base_name
        );
        return Ok(KnowledgeBaseConfig::new(base_name));
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        AppError::Knowledge(format!("Failed to read config at {:?}: {}", config_path, e))
    })?;

    let mut config: KnowledgeBaseConfig = serde_yaml::from_str(&content).map_err(|e| {
        AppError::Knowledge(format!("Failed to parse config at {:?}: {}", config_path, e))
    })?;

    // The directory name wins over whatever the file says.
    config.name = base_name.to_string();

    tracing::debug!("Loaded knowledge base config for '{}'", base_name);
    Ok(config)
}

/// Save knowledge base configuration.
pub fn save_config(workspace: &Path, config: &KnowledgeBaseConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace, &config.name);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Knowledge(format!("Failed to create config directory: {}", e))
        })?;
    }

    let yaml = serde_yaml::to_string(config)?;
    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Knowledge(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Saved knowledge base config for '{}'", config.name);
    Ok(())
}

/// Directory holding one knowledge base.
pub fn get_base_dir(workspace: &Path, base_name: &str) -> PathBuf {
    workspace
        .join(".techassist")
        .join("knowledge")
        .join(base_name)
}

pub fn get_config_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join("config.yaml")
}

/// SQLite index path for a base.
pub fn get_index_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join("index.sqlite")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path(), "TechAssistDB").unwrap();

        assert_eq!(config.name, "TechAssistDB");
        assert_eq!(config.embedding.provider, "trigram");
        assert_eq!(config.embedding.dimensions, 384);
    }

    #[test]
    fn test_save_and_load_config() {
        let temp = TempDir::new().unwrap();
        let mut config = KnowledgeBaseConfig::new("support");
        config.embedding.provider = "ollama".to_string();
        config.embedding.model = "nomic-embed-text".to_string();
        config.embedding.dimensions = 768;

        save_config(temp.path(), &config).unwrap();
        assert!(get_config_path(temp.path(), "support").exists());

        let loaded = load_config(temp.path(), "support").unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_name_follows_directory() {
        let temp = TempDir::new().unwrap();
        let path = get_config_path(temp.path(), "renamed");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "name: original\n").unwrap();

        let loaded = load_config(temp.path(), "renamed").unwrap();
        assert_eq!(loaded.name, "renamed");
        assert_eq!(loaded.embedding, EmbeddingConfig::default());
    }

    #[test]
    fn test_index_path_layout() {
        let path = get_index_path(Path::new("/ws"), "kb");
        assert_eq!(path, PathBuf::from("/ws/.techassist/knowledge/kb/index.sqlite"));
    }
}
