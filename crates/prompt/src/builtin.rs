//! Prompt definitions compiled into the binary.
//!
//! A workspace file with the same id takes precedence (see [`crate::loader`]).

pub const TRIAGE_ANALYZE: &str = "triage.analyze";
pub const TRIAGE_DIRECT: &str = "triage.direct";
pub const SPECIALIST_ANSWER: &str = "specialist.answer";
pub const DATASET_GENERATE: &str = "dataset.generate";

const BUILTINS: [(&str, &str); 4] = [
    (TRIAGE_ANALYZE, include_str!("../prompts/triage.analyze.yml")),
    (TRIAGE_DIRECT, include_str!("../prompts/triage.direct.yml")),
    (SPECIALIST_ANSWER, include_str!("../prompts/specialist.answer.yml")),
    (DATASET_GENERATE, include_str!("../prompts/dataset.generate.yml")),
];

/// Raw YAML of a built-in prompt.
pub fn builtin_source(id: &str) -> Option<&'static str> {
    BUILTINS
        .iter()
        .find(|(builtin_id, _)| *builtin_id == id)
        .map(|(_, source)| *source)
}

/// Ids of every built-in prompt.
pub fn builtin_ids() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|(id, _)| *id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PromptDefinition;

    #[test]
    fn test_every_builtin_parses_and_matches_its_id() {
        for id in builtin_ids() {
            let source = builtin_source(id).unwrap();
            let def: PromptDefinition = serde_yaml::from_str(source).unwrap();
            assert_eq!(def.id, id);
        }
    }

    #[test]
    fn test_json_prompts() {
        for (id, json) in [
            (TRIAGE_ANALYZE, true),
            (TRIAGE_DIRECT, false),
            (SPECIALIST_ANSWER, false),
            (DATASET_GENERATE, true),
        ] {
            let def: PromptDefinition = serde_yaml::from_str(builtin_source(id).unwrap()).unwrap();
            assert_eq!(def.output.is_json(), json, "{}", id);
        }
    }

    #[test]
    fn test_unknown_builtin() {
        assert!(builtin_source("agent.ask.default").is_none());
    }
}
