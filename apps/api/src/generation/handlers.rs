//! Axum route handlers for the Generation API.

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::artifacts::Artifact;
use crate::generation::request::GenerateRequest;
use crate::generation::service::GenerateResponse;
use crate::state::AppState;

/// POST /api/v1/generations
///
/// Resolves instructions, schema and model config, calls the generator and
/// records an artifact. Generator failures still leave an ERROR artifact.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    Ok(Json(state.generation.generate(request).await?))
}

/// GET /api/v1/artifacts/:id
pub async fn handle_get_artifact(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Artifact>, AppError> {
    Ok(Json(state.artifacts.get(id).await?))
}
