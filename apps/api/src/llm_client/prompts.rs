// Prompt fragments the client adds on top of the resolved system instruction.

use serde_json::Value;

/// Appended to the system prompt whenever an output schema is present.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Combines the system instruction with the JSON-only contract and schema.
pub fn build_system_prompt(instruction: Option<&str>, schema: Option<&Value>) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    if let Some(instruction) = instruction.filter(|s| !s.trim().is_empty()) {
        parts.push(instruction.to_string());
    }
    if let Some(schema) = schema {
        parts.push(JSON_ONLY_SYSTEM.to_string());
        parts.push(format!(
            "The JSON you return must conform to this JSON schema:\n{schema}"
        ));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}
