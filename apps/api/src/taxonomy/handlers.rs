use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::taxonomy::ingest::{ingest_taxonomy, IngestLimits};
use crate::taxonomy::model::{DocumentTaxonomyLink, TaxonomyNode};

#[derive(Debug, Deserialize)]
pub struct IngestBody {
    pub document_id: Uuid,
    pub created_by: Uuid,
    /// A READY artifact whose JSON output holds the taxonomy.
    pub artifact_id: Option<Uuid>,
    pub raw_output: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub document_id: Uuid,
    pub nodes: Vec<TaxonomyNode>,
    pub links: Vec<DocumentTaxonomyLink>,
}

#[derive(Debug, Deserialize)]
pub struct SubtreeQuery {
    pub path: String,
}

pub async fn handle_ingest(
    State(state): State<AppState>,
    Json(body): Json<IngestBody>,
) -> Result<(StatusCode, Json<IngestResponse>), AppError> {
    let raw_output = match (body.artifact_id, body.raw_output) {
        (Some(artifact_id), None) => {
            let artifact = state.artifacts.get(artifact_id).await?;
            if !artifact.is_ready() {
                return Err(AppError::InvalidArgument(format!(
                    "artifact {artifact_id} is not READY"
                )));
            }
            artifact
                .output_json
                .or(artifact.output_text)
                .ok_or_else(|| {
                    AppError::InvalidArgument(format!("artifact {artifact_id} has no output"))
                })?
        }
        (None, Some(raw)) => raw,
        _ => {
            return Err(AppError::InvalidArgument(
                "provide exactly one of artifact_id or raw_output".to_string(),
            ))
        }
    };

    let persisted = ingest_taxonomy(
        state.taxonomy.as_ref(),
        body.document_id,
        body.created_by,
        &raw_output,
        IngestLimits::from(state.config.as_ref()),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            document_id: body.document_id,
            nodes: persisted.nodes,
            links: persisted.links,
        }),
    ))
}

pub async fn handle_document_taxonomy(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<Vec<TaxonomyNode>>, AppError> {
    Ok(Json(state.taxonomy.list_document_nodes(document_id).await?))
}

pub async fn handle_subtree(
    State(state): State<AppState>,
    Query(query): Query<SubtreeQuery>,
) -> Result<Json<Vec<TaxonomyNode>>, AppError> {
    let path = query.path.trim().trim_matches('/');
    if path.is_empty() {
        return Err(AppError::InvalidArgument("path is required".to_string()));
    }
    Ok(Json(state.taxonomy.subtree(path).await?))
}
