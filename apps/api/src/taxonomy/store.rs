use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::taxonomy::model::{
    DocumentTaxonomyLink, PersistedTaxonomy, PlannedNode, TaxonomyNode, TaxonomyState,
};

#[async_trait]
pub trait TaxonomyStore: Send + Sync {
    /// Writes every planned node and its document link as one unit.
    /// Each node supersedes the active node at the same path.
    async fn persist_plan(
        &self,
        document_id: Uuid,
        created_by: Uuid,
        plan: &[PlannedNode],
    ) -> Result<PersistedTaxonomy, AppError>;

    /// Nodes linked to a document, ordered by path.
    async fn list_document_nodes(&self, document_id: Uuid) -> Result<Vec<TaxonomyNode>, AppError>;

    /// Active nodes at `path` and below, ordered by path.
    async fn subtree(&self, path: &str) -> Result<Vec<TaxonomyNode>, AppError>;
}

pub struct PgTaxonomyStore {
    pool: PgPool,
}

impl PgTaxonomyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaxonomyStore for PgTaxonomyStore {
    async fn persist_plan(
        &self,
        document_id: Uuid,
        created_by: Uuid,
        plan: &[PlannedNode],
    ) -> Result<PersistedTaxonomy, AppError> {
        let mut tx = self.pool.begin().await?;

        // All path locks up front, in sorted order, so overlapping ingestions
        // cannot wait on each other in a cycle.
        for lock in path_locks(plan) {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
                .bind(lock)
                .execute(&mut *tx)
                .await?;
        }

        let mut persisted = PersistedTaxonomy::default();

        for planned in plan {
            let parent_id = match planned.parent {
                Some(index) => Some(
                    persisted
                        .nodes
                        .get(index)
                        .map(|n| n.id)
                        .ok_or_else(|| {
                            anyhow::anyhow!("taxonomy plan references parent {index} before it")
                        })?,
                ),
                None => None,
            };

            let current: Option<i32> =
                sqlx::query_scalar("SELECT MAX(version) FROM taxonomy_nodes WHERE path = $1")
                    .bind(&planned.path)
                    .fetch_one(&mut *tx)
                    .await?;

            let superseded: Option<Uuid> = sqlx::query_scalar(
                "UPDATE taxonomy_nodes SET is_active = FALSE WHERE path = $1 AND is_active RETURNING id",
            )
            .bind(&planned.path)
            .fetch_optional(&mut *tx)
            .await?;

            let node = sqlx::query_as::<_, TaxonomyNode>(
                r#"INSERT INTO taxonomy_nodes
                   (id, name, description, parent_id, path, depth, state, version,
                    is_active, source_document_id, created_by)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, $9, $10)
                   RETURNING *"#,
            )
            .bind(Uuid::new_v4())
            .bind(&planned.name)
            .bind(&planned.description)
            .bind(parent_id)
            .bind(&planned.path)
            .bind(planned.depth)
            .bind(TaxonomyState::AiGenerated.as_str())
            .bind(current.unwrap_or(0) + 1)
            .bind(document_id)
            .bind(created_by)
            .fetch_one(&mut *tx)
            .await?;

            // Active children of the superseded node move under its replacement.
            if let Some(old_id) = superseded {
                sqlx::query(
                    "UPDATE taxonomy_nodes SET parent_id = $1 WHERE parent_id = $2 AND is_active",
                )
                .bind(node.id)
                .bind(old_id)
                .execute(&mut *tx)
                .await?;
            }

            let link = sqlx::query_as::<_, DocumentTaxonomyLink>(
                r#"INSERT INTO document_taxonomy_links (id, document_id, taxonomy_node_id, state)
                   VALUES ($1, $2, $3, $4)
                   RETURNING *"#,
            )
            .bind(Uuid::new_v4())
            .bind(document_id)
            .bind(node.id)
            .bind(TaxonomyState::AiGenerated.as_str())
            .fetch_one(&mut *tx)
            .await?;

            persisted.nodes.push(node);
            persisted.links.push(link);
        }

        tx.commit().await?;
        Ok(persisted)
    }

    async fn list_document_nodes(&self, document_id: Uuid) -> Result<Vec<TaxonomyNode>, AppError> {
        let nodes = sqlx::query_as::<_, TaxonomyNode>(
            r#"SELECT n.* FROM taxonomy_nodes n
               JOIN document_taxonomy_links l ON l.taxonomy_node_id = n.id
               WHERE l.document_id = $1
               ORDER BY n.path"#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(nodes)
    }

    async fn subtree(&self, path: &str) -> Result<Vec<TaxonomyNode>, AppError> {
        let nodes = sqlx::query_as::<_, TaxonomyNode>(
            r#"SELECT * FROM taxonomy_nodes
               WHERE is_active AND (path = $1 OR path LIKE $2 ESCAPE '\')
               ORDER BY path"#,
        )
        .bind(path)
        .bind(format!("{}/%", escape_like(path)))
        .fetch_all(&self.pool)
        .await?;
        Ok(nodes)
    }
}

/// Advisory lock names for every path in the plan, deduplicated and sorted.
fn path_locks(plan: &[PlannedNode]) -> Vec<String> {
    plan.iter()
        .map(|n| n.path.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|path| format!("taxonomy_nodes:{path}"))
        .collect()
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
