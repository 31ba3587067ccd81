//! Resolves a `GenerateRequest` into concrete prompt, system instruction,
//! output schema and model parameters. Read-only: every lookup happens before
//! the generator is called, so a failure here never produces an artifact.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::request::{GenerateRequest, Instructions, OutputFormat, OutputSpec};
use crate::generation::template::render_template;
use crate::versioning::models::parse_schema_value;
use crate::versioning::{
    EntityFamily, ModelConfig, PromptTemplate, SchemaTemplate, SystemInstruction, VersionRef,
    VersionStore,
};

#[derive(Debug, Clone)]
pub struct ResolvedOutput {
    pub format: OutputFormat,
    pub schema: Option<Value>,
    /// `None` for inline schemas.
    pub schema_template: Option<VersionRef>,
}

#[derive(Debug, Clone)]
pub struct ResolvedGeneration {
    pub prompt: String,
    /// `None` for inline instructions.
    pub prompt_template: Option<VersionRef>,
    pub system_instruction: Option<SystemInstruction>,
    pub output: ResolvedOutput,
    pub model: ModelConfig,
}

impl ResolvedGeneration {
    /// Output is surfaced as JSON when declared so or when any schema applies.
    pub fn expects_json(&self) -> bool {
        self.output.format == OutputFormat::Json || self.output.schema.is_some()
    }
}

#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn VersionStore>,
}

impl Resolver {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self { store }
    }

    /// Resolution order: system instruction, prompt, output schema, model config.
    pub async fn resolve(&self, request: &GenerateRequest) -> Result<ResolvedGeneration, AppError> {
        let system_instruction = self
            .resolve_system_instruction(request.instructions.system_instruction_id)
            .await?;
        let (prompt, prompt_template) = self.resolve_prompt(&request.instructions).await?;
        let output = self
            .resolve_output(&request.output, &request.instructions)
            .await?;
        let model = self.resolve_model(request.model_config_id).await?;

        debug!(
            "Resolved generation: template={:?} schema={:?} model={}",
            prompt_template.as_ref().map(|t| (&t.key, t.version)),
            output.schema_template.as_ref().map(|t| (&t.key, t.version)),
            model.parameters.name
        );

        Ok(ResolvedGeneration {
            prompt,
            prompt_template,
            system_instruction,
            output,
            model,
        })
    }

    async fn resolve_system_instruction(
        &self,
        id: Option<Uuid>,
    ) -> Result<Option<SystemInstruction>, AppError> {
        let Some(id) = id else {
            return Ok(None);
        };
        let record = self
            .store
            .get_by_id(EntityFamily::SystemInstruction, id)
            .await?;
        Ok(Some(SystemInstruction::try_from(record)?))
    }

    async fn resolve_prompt(
        &self,
        instructions: &Instructions,
    ) -> Result<(String, Option<VersionRef>), AppError> {
        // Inline text always wins; no template lookup or rendering happens.
        if let Some(inline) = instructions
            .inline
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        {
            return Ok((inline.to_string(), None));
        }

        let key = required_key(instructions.generation_type.as_deref(), "instructions")?;
        let record = match instructions.version {
            Some(version) => {
                self.store
                    .get_by_key_and_version(EntityFamily::PromptTemplate, key, version)
                    .await?
            }
            None => {
                self.store
                    .get_active_by_key(EntityFamily::PromptTemplate, key)
                    .await?
            }
        };
        let template = PromptTemplate::try_from(record)?;
        let prompt = render_template(&template.template, &instructions.variables)?;
        Ok((prompt, Some(template.source)))
    }

    async fn resolve_output(
        &self,
        output: &OutputSpec,
        instructions: &Instructions,
    ) -> Result<ResolvedOutput, AppError> {
        if let Some(inline) = &output.inline_schema {
            let schema = parse_schema_value(inline.clone())
                .map_err(|e| AppError::InvalidSchema(format!("inline schema is not JSON: {e}")))?;
            return Ok(ResolvedOutput {
                format: output.format,
                schema: Some(schema),
                schema_template: None,
            });
        }

        if let Some(version) = output.schema_version {
            return Err(AppError::InvalidArgument(format!(
                "pinned schema versions are not supported (got v{version}); \
                omit schema_version to use the active schema"
            )));
        }

        // Text output only consults the schema family when a key is given explicitly.
        let key = match (output.generation_type.as_deref(), output.format) {
            (Some(key), _) => key,
            (None, OutputFormat::Json) => instructions.generation_type.as_deref().unwrap_or(""),
            (None, OutputFormat::Text) => {
                return Ok(ResolvedOutput {
                    format: OutputFormat::Text,
                    schema: None,
                    schema_template: None,
                })
            }
        };
        let key = required_key(Some(key), "output")?;

        let record = self
            .store
            .get_active_by_key(EntityFamily::SchemaTemplate, key)
            .await?;
        let template = SchemaTemplate::try_from(record)?;
        Ok(ResolvedOutput {
            format: output.format,
            schema: Some(template.schema),
            schema_template: Some(template.source),
        })
    }

    async fn resolve_model(&self, id: Option<Uuid>) -> Result<ModelConfig, AppError> {
        let id = id.ok_or_else(|| {
            AppError::InvalidArgument("model_config_id is required".to_string())
        })?;
        let record = self.store.get_by_id(EntityFamily::ModelConfig, id).await?;
        let config = ModelConfig::try_from(record)?;
        if config.parameters.name.trim().is_empty() {
            return Err(AppError::IncompleteConfig(format!(
                "model config {} v{} has no model name",
                config.source.key, config.source.version
            )));
        }
        Ok(config)
    }
}

fn required_key<'a>(key: Option<&'a str>, section: &str) -> Result<&'a str, AppError> {
    key.map(str::trim).filter(|k| !k.is_empty()).ok_or_else(|| {
        AppError::InvalidArgument(format!("{section}: generation_type is required"))
    })
}
