//! Prompt loader for YAML prompt definitions.
//!
//! Lookup order for an id: `<workspace>/.techassist/prompts/<id>.yml`, then
//! the built-in definition of the same id.

use crate::builtin;
use crate::types::PromptDefinition;
use std::path::{Path, PathBuf};
use techassist_core::{AppError, AppResult};

/// Directory holding workspace prompt overrides.
pub fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(".techassist/prompts")
}

/// Load a prompt definition by ID.
///
/// # Arguments
/// * `workspace_path` - Workspace root to check for overrides, if any
/// * `prompt_id` - Prompt identifier (e.g., "triage.analyze")
///
/// # Example
/// ```no_run
/// use techassist_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Some(Path::new(".")), "triage.analyze")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: Option<&Path>, prompt_id: &str) -> AppResult<PromptDefinition> {
    if let Some(workspace) = workspace_path {
        let prompt_file = prompts_dir(workspace).join(format!("{}.yml", prompt_id));
        if prompt_file.exists() {
            tracing::debug!("Loading prompt override from: {:?}", prompt_file);
            let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
                AppError::Prompt(format!(
                    "Failed to read prompt file {:?}: {}",
                    prompt_file, e
                ))
            })?;
            return parse_prompt(&contents, &prompt_file.display().to_string());
        }
    }

    match builtin::builtin_source(prompt_id) {
        Some(source) => parse_prompt(source, prompt_id),
        None => Err(AppError::Prompt(format!("Prompt not found: {}", prompt_id))),
    }
}

fn parse_prompt(contents: &str, origin: &str) -> AppResult<PromptDefinition> {
    let definition: PromptDefinition = serde_yaml::from_str(contents)
        .map_err(|e| AppError::Prompt(format!("Failed to parse prompt YAML {}: {}", origin, e)))?;

    validate_prompt(&definition)?;
    Ok(definition)
}

/// List every available prompt ID: built-ins plus workspace files, sorted.
pub fn list_prompts(workspace_path: Option<&Path>) -> AppResult<Vec<String>> {
    let mut prompt_ids: Vec<String> = builtin::builtin_ids().map(str::to_string).collect();

    if let Some(workspace) = workspace_path {
        let dir = prompts_dir(workspace);
        if dir.exists() {
            for entry in walkdir::WalkDir::new(&dir)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        prompt_ids.push(stem.to_string());
                    }
                }
            }
        }
    }

    prompt_ids.sort();
    prompt_ids.dedup();
    Ok(prompt_ids)
}

fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(format!(
            "Prompt template cannot be empty: {}",
            def.id
        )));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}
