//! Generation Orchestrator.
//!
//! Flow: resolve → call generator → persist artifact (READY or ERROR) → respond.
//!
//! Resolution failures abort before any artifact exists. Once the generator has
//! been called, exactly one artifact is written whatever the outcome. There is
//! no retry and no idempotence: every call is a new audit row.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::artifacts::{ArtifactStatus, ArtifactStore, NewArtifact};
use crate::generation::generator::{Generator, GeneratorOutput, GeneratorRequest};
use crate::generation::request::{GenerateRequest, GenerationTarget, ToolConfig};
use crate::generation::resolver::{ResolvedGeneration, Resolver};
use crate::versioning::{VersionRef, VersionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    Resolving,
    CallingGenerator,
    SavingSuccess,
    SavingFailure,
    Done,
}

impl fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GenerationStage::Resolving => "RESOLVING",
            GenerationStage::CallingGenerator => "CALLING_GENERATOR",
            GenerationStage::SavingSuccess => "SAVING_SUCCESS",
            GenerationStage::SavingFailure => "SAVING_FAILURE",
            GenerationStage::Done => "DONE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub artifact_id: Uuid,
    pub output_text: String,
    /// Raw model text when JSON output was expected. Not re-validated.
    pub output_json: Option<String>,
    pub finish_reason: Option<String>,
    pub model_used: String,
    pub grounding_metadata: Option<Value>,
}

#[derive(Clone)]
pub struct GenerationService {
    resolver: Resolver,
    generator: Arc<dyn Generator>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl GenerationService {
    pub fn new(
        versions: Arc<dyn VersionStore>,
        generator: Arc<dyn Generator>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            resolver: Resolver::new(versions),
            generator,
            artifacts,
        }
    }

    pub async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, AppError> {
        info!(
            "Generation requested: document={:?} eval={:?} eval_item={:?} attempt={:?}",
            request.target.document_id,
            request.target.eval_id,
            request.target.eval_item_id,
            request.target.attempt_id
        );

        debug!(stage = %GenerationStage::Resolving, "Generation stage");
        let resolved = self.resolver.resolve(&request).await?;

        debug!(
            stage = %GenerationStage::CallingGenerator,
            model = %resolved.model.parameters.name,
            "Generation stage"
        );
        let result = self
            .generator
            .generate(GeneratorRequest {
                prompt: &resolved.prompt,
                system_instruction: resolved
                    .system_instruction
                    .as_ref()
                    .map(|si| si.text.as_str()),
                output_schema: resolved.output.schema.as_ref(),
                tools: &request.tools,
                model: &resolved.model.parameters,
            })
            .await;

        match result {
            Ok(output) => {
                self.save_success(&request.target, &request.tools, &resolved, output)
                    .await
            }
            Err(err) => {
                Err(self
                    .save_failure(&request.target, &request.tools, &resolved, err)
                    .await)
            }
        }
    }

    async fn save_success(
        &self,
        target: &GenerationTarget,
        tools: &[ToolConfig],
        resolved: &ResolvedGeneration,
        output: GeneratorOutput,
    ) -> Result<GenerateResponse, AppError> {
        debug!(stage = %GenerationStage::SavingSuccess, "Generation stage");

        let output_json = if resolved.expects_json() {
            // TODO: decide with eval consumers whether malformed JSON should fail
            // here; today it is passed through verbatim.
            if serde_json::from_str::<serde::de::IgnoredAny>(&output.output_text).is_err() {
                warn!("Generator output declared as JSON does not parse; passing it through");
            }
            Some(output.output_text.clone())
        } else {
            None
        };

        let mut metadata = artifact_metadata(resolved, tools);
        metadata["finish_reason"] = json!(output.finish_reason);
        metadata["grounding_metadata"] = output.grounding_metadata.clone().unwrap_or(Value::Null);
        metadata["model_used"] = json!(output.model_used);

        let artifact = self
            .artifacts
            .insert(NewArtifact {
                status: ArtifactStatus::Ready,
                target: target.clone(),
                prompt_text: resolved.prompt.clone(),
                prompt_template_id: resolved.prompt_template.as_ref().map(|t| t.id),
                schema_template_id: resolved.output.schema_template.as_ref().map(|t| t.id),
                model_name: resolved.model.parameters.name.clone(),
                model_params: model_params(resolved),
                output_text: Some(output.output_text.clone()),
                output_json: output_json.clone(),
                metadata,
                error: None,
            })
            .await?;

        info!("Saved artifact {} with status READY", artifact.id);
        debug!(stage = %GenerationStage::Done, "Generation finished");

        Ok(GenerateResponse {
            artifact_id: artifact.id,
            output_text: output.output_text,
            output_json,
            finish_reason: output.finish_reason,
            model_used: output.model_used,
            grounding_metadata: output.grounding_metadata,
        })
    }

    /// Records the failed attempt and hands back the error for the caller.
    async fn save_failure(
        &self,
        target: &GenerationTarget,
        tools: &[ToolConfig],
        resolved: &ResolvedGeneration,
        err: AppError,
    ) -> AppError {
        debug!(stage = %GenerationStage::SavingFailure, "Generation stage");

        let message = match err {
            AppError::Generator(message) => message,
            other => other.to_string(),
        };
        warn!("Generator call failed: {message}");

        let saved = self
            .artifacts
            .insert(NewArtifact {
                status: ArtifactStatus::Error,
                target: target.clone(),
                prompt_text: resolved.prompt.clone(),
                prompt_template_id: resolved.prompt_template.as_ref().map(|t| t.id),
                schema_template_id: resolved.output.schema_template.as_ref().map(|t| t.id),
                model_name: resolved.model.parameters.name.clone(),
                model_params: model_params(resolved),
                output_text: None,
                output_json: None,
                metadata: artifact_metadata(resolved, tools),
                error: Some(message.clone()),
            })
            .await;

        match saved {
            Ok(artifact) => info!("Saved artifact {} with status ERROR", artifact.id),
            Err(e) => error!("Failed to persist ERROR artifact: {e}"),
        }
        debug!(stage = %GenerationStage::Done, "Generation finished");
        AppError::Generator(message)
    }
}

fn model_params(resolved: &ResolvedGeneration) -> Value {
    serde_json::to_value(&resolved.model.parameters).unwrap_or(Value::Null)
}

/// Provenance blob: which system instruction and model config were used.
fn artifact_metadata(resolved: &ResolvedGeneration, tools: &[ToolConfig]) -> Value {
    let system_instruction: Option<&VersionRef> =
        resolved.system_instruction.as_ref().map(|si| &si.source);
    json!({
        "system_instruction": system_instruction,
        "model_config": resolved.model.source,
        "model_params": model_params(resolved),
        "output_format": resolved.output.format,
        "tool_count": tools.len(),
    })
}
