//! Versioned Entity Store — persistence contract shared by prompt templates,
//! schema templates, system instructions and model configs.
//!
//! Invariant: for any key, exactly one version is active once the key has at
//! least one version. Versions are numbered `max(version for key) + 1`.
//! Payloads are never edited in place; a new version is the only mutation path.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::versioning::models::{EntityFamily, NewVersion, VersionedRecord};

/// Carried in `AppState` as `Arc<dyn VersionStore>`.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Creates the next version of `new.key`. When `new.is_active` is set, or
    /// when the key has no active version yet, the new version becomes the
    /// sole active version for its key in the same unit of work.
    async fn create(
        &self,
        family: EntityFamily,
        new: NewVersion,
    ) -> Result<VersionedRecord, AppError>;

    /// Marks `id` active and every other version of its key inactive, atomically.
    async fn activate(&self, family: EntityFamily, id: Uuid) -> Result<VersionedRecord, AppError>;

    async fn get_by_id(&self, family: EntityFamily, id: Uuid)
        -> Result<VersionedRecord, AppError>;

    /// Fails with `NotFound` when the key has no active version.
    async fn get_active_by_key(
        &self,
        family: EntityFamily,
        key: &str,
    ) -> Result<VersionedRecord, AppError>;

    async fn get_by_key_and_version(
        &self,
        family: EntityFamily,
        key: &str,
        version: i32,
    ) -> Result<VersionedRecord, AppError>;

    /// All versions of a key, ascending by version.
    async fn list_versions(
        &self,
        family: EntityFamily,
        key: &str,
    ) -> Result<Vec<VersionedRecord>, AppError>;
}

/// Postgres-backed store. All four families share one column layout:
/// `(id, key, version, is_active, payload, created_by, created_at)`.
#[derive(Clone)]
pub struct PgVersionStore {
    pool: PgPool,
}

impl PgVersionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VersionStore for PgVersionStore {
    async fn create(
        &self,
        family: EntityFamily,
        new: NewVersion,
    ) -> Result<VersionedRecord, AppError> {
        new.validate()?;
        let table = family.table();
        let key = new.key.trim().to_string();

        let mut tx = self.pool.begin().await?;

        lock_key(&mut tx, table, &key).await?;

        let max_sql = format!("SELECT MAX(version) FROM {table} WHERE key = $1");
        let current_max: Option<i32> = sqlx::query_scalar(&max_sql)
            .bind(&key)
            .fetch_one(&mut *tx)
            .await?;
        let new_version = current_max.unwrap_or(0) + 1;

        let active_sql =
            format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE key = $1 AND is_active)");
        let has_active: bool = sqlx::query_scalar(&active_sql)
            .bind(&key)
            .fetch_one(&mut *tx)
            .await?;
        let activate = new.is_active || !has_active;

        let insert_sql = format!(
            r#"
            INSERT INTO {table} (id, key, version, is_active, payload, created_by)
            VALUES ($1, $2, $3, FALSE, $4, $5)
            RETURNING *
            "#
        );
        let mut record: VersionedRecord = sqlx::query_as(&insert_sql)
            .bind(Uuid::new_v4())
            .bind(&key)
            .bind(new_version)
            .bind(&new.payload)
            .bind(new.created_by)
            .fetch_one(&mut *tx)
            .await?;

        if activate {
            let update_sql = format!("UPDATE {table} SET is_active = (id = $1) WHERE key = $2");
            sqlx::query(&update_sql)
                .bind(record.id)
                .bind(&key)
                .execute(&mut *tx)
                .await?;
            record.is_active = true;
        }

        tx.commit().await?;

        info!(
            "Created {family} {key} version {new_version} (active: {})",
            record.is_active
        );
        Ok(record)
    }

    async fn activate(&self, family: EntityFamily, id: Uuid) -> Result<VersionedRecord, AppError> {
        let table = family.table();
        let mut tx = self.pool.begin().await?;

        let key_sql = format!("SELECT key FROM {table} WHERE id = $1");
        let key: String = sqlx::query_scalar(&key_sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{family} {id} not found")))?;

        // Same lock as `create`: the UPDATE below runs on a snapshot taken
        // after any concurrent create of this key has committed.
        lock_key(&mut tx, table, &key).await?;

        let update_sql = format!("UPDATE {table} SET is_active = (id = $1) WHERE key = $2");
        sqlx::query(&update_sql)
            .bind(id)
            .bind(&key)
            .execute(&mut *tx)
            .await?;

        let select_sql = format!("SELECT * FROM {table} WHERE id = $1");
        let record: VersionedRecord = sqlx::query_as(&select_sql)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("Activated {family} {} version {}", record.key, record.version);
        Ok(record)
    }

    async fn get_by_id(
        &self,
        family: EntityFamily,
        id: Uuid,
    ) -> Result<VersionedRecord, AppError> {
        let sql = format!("SELECT * FROM {} WHERE id = $1", family.table());
        sqlx::query_as::<_, VersionedRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{family} {id} not found")))
    }

    async fn get_active_by_key(
        &self,
        family: EntityFamily,
        key: &str,
    ) -> Result<VersionedRecord, AppError> {
        let sql = format!(
            "SELECT * FROM {} WHERE key = $1 AND is_active",
            family.table()
        );
        sqlx::query_as::<_, VersionedRecord>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No active {family} for key '{key}'")))
    }

    async fn get_by_key_and_version(
        &self,
        family: EntityFamily,
        key: &str,
        version: i32,
    ) -> Result<VersionedRecord, AppError> {
        let sql = format!(
            "SELECT * FROM {} WHERE key = $1 AND version = $2",
            family.table()
        );
        sqlx::query_as::<_, VersionedRecord>(&sql)
            .bind(key)
            .bind(version)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{family} '{key}' v{version} not found")))
    }

    async fn list_versions(
        &self,
        family: EntityFamily,
        key: &str,
    ) -> Result<Vec<VersionedRecord>, AppError> {
        let sql = format!(
            "SELECT * FROM {} WHERE key = $1 ORDER BY version ASC",
            family.table()
        );
        Ok(sqlx::query_as::<_, VersionedRecord>(&sql)
            .bind(key)
            .fetch_all(&self.pool)
            .await?)
    }
}

/// Advisory lock name for one key of one family table.
fn key_lock_name(table: &str, key: &str) -> String {
    format!("{table}:{key}")
}

/// Serializes every write to the versions of one key (create and activate)
/// until the surrounding transaction ends.
async fn lock_key(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    key: &str,
) -> Result<(), AppError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(key_lock_name(table, key))
        .execute(&mut **tx)
        .await?;
    Ok(())
}
