// Shared system prompts.
// Each service that needs LLM calls defines its own prompts.rs alongside it.

/// System prompt for every JSON-mode call.
pub const EVALUATOR_JSON_SYSTEM: &str =
    "You are an expert HR evaluator. Always return valid JSON only, no additional text.";

/// System prompt for free-text calls.
pub const EVALUATOR_TEXT_SYSTEM: &str =
    "You are an expert HR evaluator. Provide clear, professional responses.";
