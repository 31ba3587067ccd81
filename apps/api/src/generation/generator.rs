//! The external model collaborator.
//!
//! The orchestrator treats a `Generator` as a black box: no retries, no
//! inspection of grounding metadata, no validation of output against the
//! schema it was given.
//!
//! `AppState` holds an `Arc<dyn Generator>`; production wires in `LlmClient`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;
use crate::generation::request::ToolConfig;
use crate::versioning::ModelParameters;

/// Everything the generator needs for one call, fully resolved.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorRequest<'a> {
    pub prompt: &'a str,
    pub system_instruction: Option<&'a str>,
    pub output_schema: Option<&'a Value>,
    pub tools: &'a [ToolConfig],
    pub model: &'a ModelParameters,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratorOutput {
    pub output_text: String,
    pub finish_reason: Option<String>,
    pub model_used: String,
    pub grounding_metadata: Option<Value>,
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Failures are reported as `AppError::Generator`.
    async fn generate(&self, request: GeneratorRequest<'_>) -> Result<GeneratorOutput, AppError>;
}
