use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::taxonomy::model::{PersistedTaxonomy, PlannedNode};
use crate::taxonomy::parse::{
    classify_child, is_reserved_token, is_skippable_container, looks_like_sentence,
    normalize_name, reject_reserved_children, slug, ChildEntry, RawNode,
};
use crate::taxonomy::store::TaxonomyStore;

/// Bounds on a single ingestion.
#[derive(Debug, Clone, Copy)]
pub struct IngestLimits {
    /// Number of levels allowed, counting roots as level one.
    pub max_depth: usize,
    pub max_nodes: usize,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_depth: 16,
            max_nodes: 2000,
        }
    }
}

impl From<&Config> for IngestLimits {
    fn from(config: &Config) -> Self {
        Self {
            max_depth: config.taxonomy_max_depth,
            max_nodes: config.taxonomy_max_nodes,
        }
    }
}

/// Parses `raw_output` and persists every accepted node with a document link.
///
/// Validation runs over the whole tree before anything is written, and the
/// store writes the plan atomically, so a failure persists nothing.
pub async fn ingest_taxonomy(
    store: &dyn TaxonomyStore,
    document_id: Uuid,
    created_by: Uuid,
    raw_output: &str,
    limits: IngestLimits,
) -> Result<PersistedTaxonomy, AppError> {
    if document_id.is_nil() {
        return Err(AppError::InvalidArgument(
            "document_id is required".to_string(),
        ));
    }

    let plan = plan_taxonomy(raw_output, limits)?;
    if plan.is_empty() {
        info!("Taxonomy for document {} had no acceptable nodes", document_id);
        return Ok(PersistedTaxonomy::default());
    }

    let persisted = store.persist_plan(document_id, created_by, &plan).await?;
    info!(
        "Ingested {} taxonomy nodes for document {}",
        persisted.nodes.len(),
        document_id
    );
    Ok(persisted)
}

/// Validates the model output and flattens it into parent-before-child order.
pub fn plan_taxonomy(raw_output: &str, limits: IngestLimits) -> Result<Vec<PlannedNode>, AppError> {
    let roots = proposed_roots(raw_output)?;
    let mut planner = Planner::new(limits);
    reject_reserved_children("proposed_taxonomy", &roots)?;
    planner.walk(&roots, None, 0)?;
    Ok(planner.nodes)
}

fn proposed_roots(raw_output: &str) -> Result<Vec<Value>, AppError> {
    let parsed: Value = serde_json::from_str(raw_output.trim())
        .map_err(|e| AppError::InvalidArgument(format!("taxonomy output is not valid JSON: {e}")))?;

    match parsed {
        Value::Object(mut map) => match map.remove("proposed_taxonomy") {
            Some(Value::Array(roots)) => Ok(roots),
            Some(_) => Err(AppError::InvalidArgument(
                "proposed_taxonomy must be an array".to_string(),
            )),
            None => Err(AppError::InvalidArgument(
                "taxonomy output has no proposed_taxonomy field".to_string(),
            )),
        },
        _ => Err(AppError::InvalidArgument(
            "taxonomy output must be a JSON object".to_string(),
        )),
    }
}

struct Planner {
    limits: IngestLimits,
    nodes: Vec<PlannedNode>,
    by_path: HashMap<String, usize>,
}

impl Planner {
    fn new(limits: IngestLimits) -> Self {
        Self {
            limits,
            nodes: Vec::new(),
            by_path: HashMap::new(),
        }
    }

    fn walk(&mut self, entries: &[Value], parent: Option<usize>, depth: usize) -> Result<(), AppError> {
        for entry in entries {
            match classify_child(entry)? {
                ChildEntry::Object(node) => self.visit_node(node, parent, depth)?,
                ChildEntry::Leaf(label) => self.visit_leaf(&label, parent, depth)?,
            }
        }
        Ok(())
    }

    fn visit_node(&mut self, node: RawNode, parent: Option<usize>, depth: usize) -> Result<(), AppError> {
        let name = normalize_name(&node.name);
        if name.is_empty() {
            return Err(AppError::InvalidArgument(
                "taxonomy node has an empty name".to_string(),
            ));
        }
        reject_reserved_children(&name, &node.children)?;

        if is_skippable_container(&name) {
            debug!("Flattening container node '{}'", name);
            return self.walk(&node.children, parent, depth);
        }

        let description = node
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let index = self.accept(name, description, parent, depth)?;
        self.walk(&node.children, Some(index), depth + 1)
    }

    fn visit_leaf(&mut self, label: &str, parent: Option<usize>, depth: usize) -> Result<(), AppError> {
        // Roots and children are both screened for leaked keys before walking.
        debug_assert!(!is_reserved_token(label));

        if looks_like_sentence(label) {
            debug!("Discarding sentence-like taxonomy label");
            return Ok(());
        }
        let name = normalize_name(label);
        if name.is_empty() {
            return Err(AppError::InvalidArgument(
                "taxonomy label is empty".to_string(),
            ));
        }
        if is_skippable_container(&name) {
            return Ok(());
        }
        self.accept(name, None, parent, depth).map(|_| ())
    }

    /// Returns the plan index for the node, merging with an earlier entry
    /// that resolved to the same path.
    fn accept(
        &mut self,
        name: String,
        description: Option<String>,
        parent: Option<usize>,
        depth: usize,
    ) -> Result<usize, AppError> {
        if depth >= self.limits.max_depth {
            return Err(AppError::InvalidArgument(format!(
                "taxonomy exceeds the maximum depth of {}",
                self.limits.max_depth
            )));
        }

        let segment = slug(&name);
        if segment.is_empty() {
            return Err(AppError::InvalidArgument(format!(
                "taxonomy name '{name}' has no usable characters"
            )));
        }
        let path = match parent.and_then(|p| self.nodes.get(p)) {
            Some(parent_node) => format!("{}/{}", parent_node.path, segment),
            None => segment,
        };

        if let Some(&existing) = self.by_path.get(&path) {
            if let Some(node) = self.nodes.get_mut(existing) {
                if node.description.is_none() {
                    node.description = description;
                }
            }
            return Ok(existing);
        }

        if self.nodes.len() >= self.limits.max_nodes {
            return Err(AppError::InvalidArgument(format!(
                "taxonomy exceeds the maximum of {} nodes",
                self.limits.max_nodes
            )));
        }

        let index = self.nodes.len();
        self.nodes.push(PlannedNode {
            name,
            description,
            path: path.clone(),
            depth: depth as i32,
            parent,
        });
        self.by_path.insert(path, index);
        Ok(index)
    }
}
