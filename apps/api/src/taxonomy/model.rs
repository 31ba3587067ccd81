use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Review state shared by taxonomy nodes and document links. Ingestion only
/// writes `AiGenerated`; curator states (`approved`, `rejected`) are written
/// outside this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomyState {
    AiGenerated,
}

impl TaxonomyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxonomyState::AiGenerated => "ai_generated",
        }
    }
}

/// A node in the taxonomy tree. Children are found by `parent_id`; `path` is
/// the slash-joined slug ancestry. At most one active node per path.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaxonomyNode {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub path: String,
    pub depth: i32,
    pub state: String,
    pub version: i32,
    pub is_active: bool,
    pub source_document_id: Uuid,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Join between a document and a taxonomy node. Its state is independent of
/// the node's own state.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DocumentTaxonomyLink {
    pub id: Uuid,
    pub document_id: Uuid,
    pub taxonomy_node_id: Uuid,
    pub state: String,
    pub confidence: Option<f64>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A node accepted by the planner, not yet persisted.
/// `parent` indexes an earlier entry of the same plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedNode {
    pub name: String,
    pub description: Option<String>,
    pub path: String,
    pub depth: i32,
    pub parent: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct PersistedTaxonomy {
    pub nodes: Vec<TaxonomyNode>,
    pub links: Vec<DocumentTaxonomyLink>,
}
