use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// What a generation is about. All fields are optional and may be combined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationTarget {
    #[serde(default)]
    pub document_id: Option<Uuid>,
    #[serde(default)]
    pub eval_id: Option<Uuid>,
    #[serde(default)]
    pub eval_item_id: Option<Uuid>,
    #[serde(default)]
    pub attempt_id: Option<Uuid>,
}

/// Prompt source: inline text, or a generation-type key resolved against the
/// prompt template family (pinned version or active version) and rendered
/// with `variables`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Instructions {
    #[serde(default)]
    pub inline: Option<String>,
    #[serde(default)]
    pub generation_type: Option<String>,
    #[serde(default)]
    pub version: Option<i32>,
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    #[serde(default)]
    pub system_instruction_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Output contract: an inline JSON schema, or the active schema template for
/// a generation type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputSpec {
    #[serde(default)]
    pub format: OutputFormat,
    /// Either a JSON schema value or JSON schema text.
    #[serde(default)]
    pub inline_schema: Option<Value>,
    /// Falls back to `Instructions::generation_type` when absent.
    #[serde(default)]
    pub generation_type: Option<String>,
    /// Pinned schema versions are rejected during resolution.
    #[serde(default)]
    pub schema_version: Option<i32>,
}

/// Opaque tool-specific configuration forwarded to the generator as-is
/// (e.g. retrieval augmentation settings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolConfig(pub Value);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(flatten)]
    pub target: GenerationTarget,
    pub instructions: Instructions,
    #[serde(default)]
    pub output: OutputSpec,
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
    #[serde(default)]
    pub model_config_id: Option<Uuid>,
}
