//! Static capability table for the Claude models served through Vertex AI.

/// Model used when no other is configured.
pub const DEFAULT_MODEL: &str = "claude-3-opus@20240229";

/// Capabilities of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
    /// Context window in tokens.
    pub context_length: u32,
    /// Whether image input is accepted.
    pub vision: bool,
    /// Largest `max_tokens` the model is used with.
    pub max_response_tokens: u32,
}

/// Capabilities assumed for models missing from the catalog.
pub const DEFAULT_MODEL_INFO: ModelInfo = ModelInfo {
    context_length: 100_000,
    vision: true,
    max_response_tokens: 10_000,
};

const CATALOG: &[(&str, ModelInfo)] = &[
    ("claude-3-opus-20240229", DEFAULT_MODEL_INFO),
    ("claude-3-sonnet-20240229", DEFAULT_MODEL_INFO),
    ("claude-3-haiku-20240307", DEFAULT_MODEL_INFO),
    ("claude-3-sonnet-20240229-steering-preview", DEFAULT_MODEL_INFO),
    ("claude-3-5-sonnet-20240620", DEFAULT_MODEL_INFO),
];

/// Look up a model by name. Vertex model ids (`claude-3-opus@20240229`) and
/// Anthropic ids (`claude-3-opus-20240229`) resolve to the same entry.
pub fn model_info(model: &str) -> ModelInfo {
    let normalized = model.replace('@', "-");
    CATALOG
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, info)| *info)
        .unwrap_or(DEFAULT_MODEL_INFO)
}

/// Whether the catalog has an explicit entry for this model.
pub fn is_known_model(model: &str) -> bool {
    let normalized = model.replace('@', "-");
    CATALOG.iter().any(|(name, _)| *name == normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_and_anthropic_ids_match() {
        assert!(is_known_model("claude-3-5-sonnet@20240620"));
        assert!(is_known_model("claude-3-5-sonnet-20240620"));
        assert!(is_known_model(DEFAULT_MODEL));
    }

    #[test]
    fn test_unknown_model_falls_back() {
        assert!(!is_known_model("claude-9"));
        assert_eq!(model_info("claude-9"), DEFAULT_MODEL_INFO);
        assert_eq!(model_info("claude-3-haiku@20240307").max_response_tokens, 10_000);
    }
}
