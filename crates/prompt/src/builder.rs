//! Prompt builder: renders a definition's templates with Handlebars.

use crate::types::{BuiltPrompt, PromptDefinition};
use handlebars::Handlebars;
use serde::Serialize;
use techassist_core::{AppError, AppResult};

/// Build a prompt from a definition and template data.
///
/// Both the system and user templates are rendered against `data`. HTML
/// escaping is disabled; missing variables render as empty strings.
///
/// # Example
/// ```no_run
/// use techassist_prompt::{build_prompt, load_prompt};
/// use serde_json::json;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = load_prompt(None, "triage.direct")?;
/// let built = build_prompt(&def, &json!({ "query": "How do I install?" }))?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt<T: Serialize>(
    definition: &PromptDefinition,
    data: &T,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);

    let system = match definition.system {
        Some(ref template) => Some(render(&mut handlebars, "system", template, data)?),
        None => None,
    };
    let user = render(&mut handlebars, "user", &definition.template, data)?;

    Ok(BuiltPrompt {
        system,
        user,
        temperature: definition.sampling.temperature,
        max_tokens: definition.sampling.max_tokens,
        json_output: definition.output.is_json(),
        source_prompt_id: definition.id.clone(),
    })
}

fn render<T: Serialize>(
    handlebars: &mut Handlebars<'_>,
    name: &str,
    template: &str,
    data: &T,
) -> AppResult<String> {
    handlebars
        .register_template_string(name, template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template {}: {}", name, e)))?;

    handlebars
        .render(name, data)
        .map(|rendered| rendered.trim_end().to_string())
        .map_err(|e| AppError::Prompt(format!("Failed to render template {}: {}", name, e)))
}
