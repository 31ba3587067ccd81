use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::versioning::models::{EntityFamily, NewVersion, VersionedRecord};

/// POST /api/v1/catalog/:family
pub async fn handle_create(
    State(state): State<AppState>,
    Path(family): Path<String>,
    Json(req): Json<NewVersion>,
) -> Result<(StatusCode, Json<VersionedRecord>), AppError> {
    let family: EntityFamily = family.parse()?;
    let record = state.versions.create(family, req).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// POST /api/v1/catalog/:family/:id/activate
pub async fn handle_activate(
    State(state): State<AppState>,
    Path((family, id)): Path<(String, Uuid)>,
) -> Result<Json<VersionedRecord>, AppError> {
    let family: EntityFamily = family.parse()?;
    Ok(Json(state.versions.activate(family, id).await?))
}

/// GET /api/v1/catalog/:family/:id
pub async fn handle_get_by_id(
    State(state): State<AppState>,
    Path((family, id)): Path<(String, Uuid)>,
) -> Result<Json<VersionedRecord>, AppError> {
    let family: EntityFamily = family.parse()?;
    Ok(Json(state.versions.get_by_id(family, id).await?))
}

/// GET /api/v1/catalog/:family/keys/:key/active
pub async fn handle_get_active(
    State(state): State<AppState>,
    Path((family, key)): Path<(String, String)>,
) -> Result<Json<VersionedRecord>, AppError> {
    let family: EntityFamily = family.parse()?;
    Ok(Json(state.versions.get_active_by_key(family, &key).await?))
}

/// GET /api/v1/catalog/:family/keys/:key/versions
pub async fn handle_list_versions(
    State(state): State<AppState>,
    Path((family, key)): Path<(String, String)>,
) -> Result<Json<Vec<VersionedRecord>>, AppError> {
    let family: EntityFamily = family.parse()?;
    Ok(Json(state.versions.list_versions(family, &key).await?))
}

/// GET /api/v1/catalog/:family/keys/:key/versions/:version
pub async fn handle_get_version(
    State(state): State<AppState>,
    Path((family, key, version)): Path<(String, String, i32)>,
) -> Result<Json<VersionedRecord>, AppError> {
    let family: EntityFamily = family.parse()?;
    Ok(Json(
        state
            .versions
            .get_by_key_and_version(family, &key, version)
            .await?,
    ))
}
