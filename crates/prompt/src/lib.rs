//! Prompt system for TechAssist.
//!
//! - YAML prompt definitions, built in or overridden per workspace
//! - Handlebars rendering of system and user templates
//! - Sampling defaults carried alongside the rendered text

pub mod builder;
pub mod builtin;
pub mod loader;
pub mod types;

use std::path::PathBuf;

use techassist_core::AppResult;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{list_prompts, load_prompt};
pub use types::{BuiltPrompt, PromptBehavior, PromptDefinition, PromptOutputSpec, PromptSampling};

/// Resolves prompt ids against an optional workspace, then the built-ins.
#[derive(Debug, Clone, Default)]
pub struct PromptCatalog {
    workspace: Option<PathBuf>,
}

impl PromptCatalog {
    /// Built-in prompts only.
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Built-in prompts, overridable from `<workspace>/.techassist/prompts/`.
    pub fn for_workspace(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: Some(workspace.into()),
        }
    }

    /// Load and render a prompt in one step.
    pub fn render<T: serde::Serialize>(&self, prompt_id: &str, data: &T) -> AppResult<BuiltPrompt> {
        let definition = load_prompt(self.workspace.as_deref(), prompt_id)?;
        build_prompt(&definition, data)
    }
}
