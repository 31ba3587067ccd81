//! Artifacts — the immutable audit record of one generation attempt.
//!
//! Written exactly once per attempt that reaches the generator (success or
//! failure) and never updated afterwards.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::request::GenerationTarget;

pub const ARTIFACT_TYPE_GENERATION: &str = "GENERATION";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactStatus {
    Ready,
    Error,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Ready => "READY",
            ArtifactStatus::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Artifact {
    pub id: Uuid,
    pub artifact_type: String,
    pub status: String,
    pub document_id: Option<Uuid>,
    pub eval_id: Option<Uuid>,
    pub eval_item_id: Option<Uuid>,
    pub attempt_id: Option<Uuid>,
    pub prompt_text: String,
    pub prompt_template_id: Option<Uuid>,
    pub schema_template_id: Option<Uuid>,
    pub model_name: String,
    pub model_params: Value,
    pub output_text: Option<String>,
    /// Raw text, stored verbatim even when it is not valid JSON.
    pub output_json: Option<String>,
    pub metadata: Value,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn is_ready(&self) -> bool {
        self.status == ArtifactStatus::Ready.as_str()
    }
}

/// Input for writing an artifact.
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub status: ArtifactStatus,
    pub target: GenerationTarget,
    pub prompt_text: String,
    pub prompt_template_id: Option<Uuid>,
    pub schema_template_id: Option<Uuid>,
    pub model_name: String,
    pub model_params: Value,
    pub output_text: Option<String>,
    pub output_json: Option<String>,
    pub metadata: Value,
    pub error: Option<String>,
}

/// Carried in `AppState` as `Arc<dyn ArtifactStore>`. Insert-only by design
/// of the audit trail: there is no update operation.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn insert(&self, artifact: NewArtifact) -> Result<Artifact, AppError>;

    async fn get(&self, id: Uuid) -> Result<Artifact, AppError>;
}

#[derive(Clone)]
pub struct PgArtifactStore {
    pool: PgPool,
}

impl PgArtifactStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtifactStore for PgArtifactStore {
    async fn insert(&self, artifact: NewArtifact) -> Result<Artifact, AppError> {
        let NewArtifact {
            status,
            target,
            prompt_text,
            prompt_template_id,
            schema_template_id,
            model_name,
            model_params,
            output_text,
            output_json,
            metadata,
            error,
        } = artifact;

        Ok(sqlx::query_as::<_, Artifact>(
            r#"
            INSERT INTO artifacts
                (id, artifact_type, status, document_id, eval_id, eval_item_id, attempt_id,
                 prompt_text, prompt_template_id, schema_template_id, model_name, model_params,
                 output_text, output_json, metadata, error)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(ARTIFACT_TYPE_GENERATION)
        .bind(status.as_str())
        .bind(target.document_id)
        .bind(target.eval_id)
        .bind(target.eval_item_id)
        .bind(target.attempt_id)
        .bind(prompt_text)
        .bind(prompt_template_id)
        .bind(schema_template_id)
        .bind(model_name)
        .bind(model_params)
        .bind(output_text)
        .bind(output_json)
        .bind(metadata)
        .bind(error)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn get(&self, id: Uuid) -> Result<Artifact, AppError> {
        sqlx::query_as::<_, Artifact>("SELECT * FROM artifacts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Artifact {id} not found")))
    }
}
