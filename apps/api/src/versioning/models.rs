use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;

/// The four independently versioned entity families.
/// Each family lives in its own table with an identical column layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityFamily {
    PromptTemplate,
    SchemaTemplate,
    SystemInstruction,
    ModelConfig,
}

impl EntityFamily {
    pub const ALL: [EntityFamily; 4] = [
        EntityFamily::PromptTemplate,
        EntityFamily::SchemaTemplate,
        EntityFamily::SystemInstruction,
        EntityFamily::ModelConfig,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            EntityFamily::PromptTemplate => "prompt_templates",
            EntityFamily::SchemaTemplate => "schema_templates",
            EntityFamily::SystemInstruction => "system_instructions",
            EntityFamily::ModelConfig => "model_configs",
        }
    }

    /// URL path segment used by the catalog routes.
    pub fn slug(&self) -> &'static str {
        match self {
            EntityFamily::PromptTemplate => "prompt-templates",
            EntityFamily::SchemaTemplate => "schema-templates",
            EntityFamily::SystemInstruction => "system-instructions",
            EntityFamily::ModelConfig => "model-configs",
        }
    }
}

impl fmt::Display for EntityFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityFamily::PromptTemplate => "prompt template",
            EntityFamily::SchemaTemplate => "schema template",
            EntityFamily::SystemInstruction => "system instruction",
            EntityFamily::ModelConfig => "model config",
        };
        f.write_str(label)
    }
}

impl FromStr for EntityFamily {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityFamily::ALL
            .into_iter()
            .find(|f| f.slug() == s)
            .ok_or_else(|| AppError::NotFound(format!("Unknown entity family '{s}'")))
    }
}

/// One stored version of a versioned entity.
/// The payload is immutable once written; only `is_active` ever changes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VersionedRecord {
    pub id: Uuid,
    pub key: String,
    pub version: i32,
    pub is_active: bool,
    pub payload: Value,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new version of a key.
#[derive(Debug, Clone, Deserialize)]
pub struct NewVersion {
    pub key: String,
    pub payload: Value,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub created_by: Option<Uuid>,
}

impl NewVersion {
    #[cfg(test)]
    pub fn new(key: impl Into<String>, payload: Value, is_active: bool) -> Self {
        Self {
            key: key.into(),
            payload,
            is_active,
            created_by: None,
        }
    }

    /// Rejects empty keys and empty payloads. Payload content (template
    /// syntax, schema shape) is deliberately not inspected here.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.key.trim().is_empty() {
            return Err(AppError::InvalidArgument("key cannot be empty".to_string()));
        }
        if is_empty_payload(&self.payload) {
            return Err(AppError::InvalidArgument(
                "payload cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn is_empty_payload(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(m) => m.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Typed family views
// ────────────────────────────────────────────────────────────────────────────

/// Identifies which stored version was used. Recorded in artifact metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionRef {
    pub id: Uuid,
    pub key: String,
    pub version: i32,
}

impl From<&VersionedRecord> for VersionRef {
    fn from(record: &VersionedRecord) -> Self {
        Self {
            id: record.id,
            key: record.key.clone(),
            version: record.version,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub source: VersionRef,
    pub template: String,
}

impl TryFrom<VersionedRecord> for PromptTemplate {
    type Error = AppError;

    fn try_from(record: VersionedRecord) -> Result<Self, Self::Error> {
        let source = VersionRef::from(&record);
        match record.payload {
            Value::String(template) => Ok(Self { source, template }),
            _ => Err(AppError::InvalidTemplate(format!(
                "prompt template {} v{} payload is not a string",
                source.key, source.version
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchemaTemplate {
    pub source: VersionRef,
    pub schema: Value,
}

impl TryFrom<VersionedRecord> for SchemaTemplate {
    type Error = AppError;

    fn try_from(record: VersionedRecord) -> Result<Self, Self::Error> {
        let source = VersionRef::from(&record);
        let schema = parse_schema_value(record.payload).map_err(|e| {
            AppError::InvalidSchema(format!(
                "schema template {} v{}: {e}",
                source.key, source.version
            ))
        })?;
        Ok(Self { source, schema })
    }
}

/// A schema may arrive as a JSON value or as JSON text; text is parsed here.
pub fn parse_schema_value(schema: Value) -> Result<Value, serde_json::Error> {
    match schema {
        Value::String(text) => serde_json::from_str(&text),
        other => Ok(other),
    }
}

#[derive(Debug, Clone)]
pub struct SystemInstruction {
    pub source: VersionRef,
    pub text: String,
}

impl TryFrom<VersionedRecord> for SystemInstruction {
    type Error = AppError;

    fn try_from(record: VersionedRecord) -> Result<Self, Self::Error> {
        let source = VersionRef::from(&record);
        match record.payload {
            Value::String(text) => Ok(Self { source, text }),
            _ => Err(AppError::InvalidArgument(format!(
                "system instruction {} v{} payload is not a string",
                source.key, source.version
            ))),
        }
    }
}

/// Sampling parameters stored in a model config payload.
/// Unknown keys are kept in `extra` and forwarded untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub source: VersionRef,
    pub parameters: ModelParameters,
}

impl TryFrom<VersionedRecord> for ModelConfig {
    type Error = AppError;

    fn try_from(record: VersionedRecord) -> Result<Self, Self::Error> {
        let source = VersionRef::from(&record);
        let parameters: ModelParameters = serde_json::from_value(record.payload).map_err(|e| {
            AppError::IncompleteConfig(format!(
                "model config {} v{} is malformed: {e}",
                source.key, source.version
            ))
        })?;
        Ok(Self { source, parameters })
    }
}
