//! In-memory implementations of the store and generator seams for unit and
//! router tests. They follow the same contracts as the Postgres stores.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::generation::artifacts::{Artifact, ArtifactStore, NewArtifact, ARTIFACT_TYPE_GENERATION};
use crate::generation::generator::{Generator, GeneratorOutput, GeneratorRequest};
use crate::generation::request::ToolConfig;
use crate::state::AppState;
use crate::taxonomy::model::{
    DocumentTaxonomyLink, PersistedTaxonomy, PlannedNode, TaxonomyNode, TaxonomyState,
};
use crate::taxonomy::store::TaxonomyStore;
use crate::versioning::models::{NewVersion, VersionedRecord};
use crate::versioning::{EntityFamily, ModelParameters, VersionStore};

#[derive(Default)]
pub struct MemoryVersionStore {
    records: Mutex<HashMap<EntityFamily, Vec<VersionedRecord>>>,
    lookups: Mutex<HashMap<EntityFamily, usize>>,
}

impl MemoryVersionStore {
    /// Number of read calls made against `family`.
    pub fn lookups(&self, family: EntityFamily) -> usize {
        self.lookups
            .lock()
            .unwrap()
            .get(&family)
            .copied()
            .unwrap_or(0)
    }

    fn count_lookup(&self, family: EntityFamily) {
        *self.lookups.lock().unwrap().entry(family).or_default() += 1;
    }

    fn find<F>(&self, family: EntityFamily, pred: F) -> Option<VersionedRecord>
    where
        F: Fn(&VersionedRecord) -> bool,
    {
        self.count_lookup(family);
        self.records
            .lock()
            .unwrap()
            .get(&family)
            .and_then(|rows| rows.iter().find(|r| pred(r)).cloned())
    }
}

#[async_trait]
impl VersionStore for MemoryVersionStore {
    async fn create(
        &self,
        family: EntityFamily,
        new: NewVersion,
    ) -> Result<VersionedRecord, AppError> {
        new.validate()?;
        let key = new.key.trim().to_string();
        let mut records = self.records.lock().unwrap();
        let rows = records.entry(family).or_default();

        let version = rows
            .iter()
            .filter(|r| r.key == key)
            .map(|r| r.version)
            .max()
            .unwrap_or(0)
            + 1;
        let has_active = rows.iter().any(|r| r.key == key && r.is_active);
        let activate = new.is_active || !has_active;
        if activate {
            for row in rows.iter_mut().filter(|r| r.key == key) {
                row.is_active = false;
            }
        }

        let record = VersionedRecord {
            id: Uuid::new_v4(),
            key,
            version,
            is_active: activate,
            payload: new.payload,
            created_by: new.created_by,
            created_at: Utc::now(),
        };
        rows.push(record.clone());
        Ok(record)
    }

    async fn activate(&self, family: EntityFamily, id: Uuid) -> Result<VersionedRecord, AppError> {
        let mut records = self.records.lock().unwrap();
        let rows = records.entry(family).or_default();
        let key = rows
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.key.clone())
            .ok_or_else(|| AppError::NotFound(format!("{family} {id} not found")))?;

        let mut activated = None;
        for row in rows.iter_mut().filter(|r| r.key == key) {
            row.is_active = row.id == id;
            if row.is_active {
                activated = Some(row.clone());
            }
        }
        activated.ok_or_else(|| AppError::NotFound(format!("{family} {id} not found")))
    }

    async fn get_by_id(&self, family: EntityFamily, id: Uuid) -> Result<VersionedRecord, AppError> {
        self.find(family, |r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("{family} {id} not found")))
    }

    async fn get_active_by_key(
        &self,
        family: EntityFamily,
        key: &str,
    ) -> Result<VersionedRecord, AppError> {
        self.find(family, |r| r.key == key && r.is_active)
            .ok_or_else(|| AppError::NotFound(format!("No active {family} for key '{key}'")))
    }

    async fn get_by_key_and_version(
        &self,
        family: EntityFamily,
        key: &str,
        version: i32,
    ) -> Result<VersionedRecord, AppError> {
        self.find(family, |r| r.key == key && r.version == version)
            .ok_or_else(|| AppError::NotFound(format!("{family} '{key}' v{version} not found")))
    }

    async fn list_versions(
        &self,
        family: EntityFamily,
        key: &str,
    ) -> Result<Vec<VersionedRecord>, AppError> {
        let records = self.records.lock().unwrap();
        let mut rows: Vec<VersionedRecord> = records
            .get(&family)
            .map(|rows| rows.iter().filter(|r| r.key == key).cloned().collect())
            .unwrap_or_default();
        rows.sort_by_key(|r| r.version);
        Ok(rows)
    }
}

/// Creates an active model config under key `default` and returns its id.
pub async fn seed_model_config(store: &MemoryVersionStore, name: &str) -> Uuid {
    store
        .create(
            EntityFamily::ModelConfig,
            NewVersion::new(
                "default",
                json!({"name": name, "temperature": 0.2, "max_output_tokens": 2048}),
                true,
            ),
        )
        .await
        .unwrap()
        .id
}

#[derive(Default)]
pub struct MemoryArtifactStore {
    rows: Mutex<Vec<Artifact>>,
}

impl MemoryArtifactStore {
    pub fn all(&self) -> Vec<Artifact> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn insert(&self, artifact: NewArtifact) -> Result<Artifact, AppError> {
        let row = Artifact {
            id: Uuid::new_v4(),
            artifact_type: ARTIFACT_TYPE_GENERATION.to_string(),
            status: artifact.status.as_str().to_string(),
            document_id: artifact.target.document_id,
            eval_id: artifact.target.eval_id,
            eval_item_id: artifact.target.eval_item_id,
            attempt_id: artifact.target.attempt_id,
            prompt_text: artifact.prompt_text,
            prompt_template_id: artifact.prompt_template_id,
            schema_template_id: artifact.schema_template_id,
            model_name: artifact.model_name,
            model_params: artifact.model_params,
            output_text: artifact.output_text,
            output_json: artifact.output_json,
            metadata: artifact.metadata,
            error: artifact.error,
            created_at: Utc::now(),
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> Result<Artifact, AppError> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Artifact {id} not found")))
    }
}

/// What the generator was asked to do, captured with owned data.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub system_instruction: Option<String>,
    pub output_schema: Option<Value>,
    pub tools: Vec<ToolConfig>,
    pub model: ModelParameters,
}

/// Returns a fixed reply, or fails with a fixed message, and records calls.
pub struct ScriptedGenerator {
    reply: Result<String, String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGenerator {
    pub fn succeeding(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: GeneratorRequest<'_>) -> Result<GeneratorOutput, AppError> {
        self.calls.lock().unwrap().push(RecordedCall {
            prompt: request.prompt.to_string(),
            system_instruction: request.system_instruction.map(str::to_string),
            output_schema: request.output_schema.cloned(),
            tools: request.tools.to_vec(),
            model: request.model.clone(),
        });

        match &self.reply {
            Ok(text) => Ok(GeneratorOutput {
                output_text: text.clone(),
                finish_reason: Some("end_turn".to_string()),
                // Providers report a dated snapshot, not the configured alias.
                model_used: format!("{}-20250929", request.model.name),
                grounding_metadata: None,
            }),
            Err(message) => Err(AppError::Generator(message.clone())),
        }
    }
}

#[derive(Default)]
pub struct MemoryTaxonomyStore {
    nodes: Mutex<Vec<TaxonomyNode>>,
    links: Mutex<Vec<DocumentTaxonomyLink>>,
    fail_after: Option<usize>,
}

impl MemoryTaxonomyStore {
    /// Fails once `count` nodes of a plan have been written, before commit.
    pub fn failing_after(count: usize) -> Self {
        Self {
            fail_after: Some(count),
            ..Default::default()
        }
    }

    pub fn all_nodes(&self) -> Vec<TaxonomyNode> {
        self.nodes.lock().unwrap().clone()
    }

    pub fn all_links(&self) -> Vec<DocumentTaxonomyLink> {
        self.links.lock().unwrap().clone()
    }
}

fn is_within(path: &str, root: &str) -> bool {
    path == root
        || path
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[async_trait]
impl TaxonomyStore for MemoryTaxonomyStore {
    async fn persist_plan(
        &self,
        document_id: Uuid,
        created_by: Uuid,
        plan: &[PlannedNode],
    ) -> Result<PersistedTaxonomy, AppError> {
        let mut nodes = self.nodes.lock().unwrap();
        let mut links = self.links.lock().unwrap();
        // Work on copies; only a complete plan replaces the committed rows.
        let mut staged_nodes = nodes.clone();
        let mut persisted = PersistedTaxonomy::default();

        for (index, planned) in plan.iter().enumerate() {
            if self.fail_after == Some(index) {
                return Err(AppError::Internal(anyhow::anyhow!(
                    "simulated failure after {index} nodes"
                )));
            }
            let parent_id = match planned.parent {
                Some(p) => Some(
                    persisted
                        .nodes
                        .get(p)
                        .map(|n| n.id)
                        .ok_or_else(|| anyhow::anyhow!("parent {p} not yet written"))?,
                ),
                None => None,
            };

            let version = staged_nodes
                .iter()
                .filter(|n| n.path == planned.path)
                .map(|n| n.version)
                .max()
                .unwrap_or(0)
                + 1;
            let superseded = staged_nodes
                .iter_mut()
                .find(|n| n.path == planned.path && n.is_active)
                .map(|n| {
                    n.is_active = false;
                    n.id
                });

            let node = TaxonomyNode {
                id: Uuid::new_v4(),
                name: planned.name.clone(),
                description: planned.description.clone(),
                parent_id,
                path: planned.path.clone(),
                depth: planned.depth,
                state: TaxonomyState::AiGenerated.as_str().to_string(),
                version,
                is_active: true,
                source_document_id: document_id,
                created_by,
                created_at: Utc::now(),
            };
            let link = DocumentTaxonomyLink {
                id: Uuid::new_v4(),
                document_id,
                taxonomy_node_id: node.id,
                state: TaxonomyState::AiGenerated.as_str().to_string(),
                confidence: None,
                approved_by: None,
                approved_at: None,
                created_at: Utc::now(),
            };
            if let Some(old_id) = superseded {
                for child in staged_nodes
                    .iter_mut()
                    .filter(|n| n.is_active && n.parent_id == Some(old_id))
                {
                    child.parent_id = Some(node.id);
                }
            }
            staged_nodes.push(node.clone());
            persisted.nodes.push(node);
            persisted.links.push(link);
        }

        *nodes = staged_nodes;
        links.extend(persisted.links.iter().cloned());
        Ok(persisted)
    }

    async fn list_document_nodes(&self, document_id: Uuid) -> Result<Vec<TaxonomyNode>, AppError> {
        // Same lock order as `persist_plan`: nodes, then links.
        let nodes = self.nodes.lock().unwrap();
        let links = self.links.lock().unwrap();
        let mut nodes: Vec<TaxonomyNode> = nodes
            .iter()
            .filter(|n| {
                links
                    .iter()
                    .any(|l| l.document_id == document_id && l.taxonomy_node_id == n.id)
            })
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(nodes)
    }

    async fn subtree(&self, path: &str) -> Result<Vec<TaxonomyNode>, AppError> {
        let mut nodes: Vec<TaxonomyNode> = self
            .nodes
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.is_active && is_within(&n.path, path))
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(nodes)
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/learnforge_test".to_string(),
        db_max_connections: 1,
        generator_api_key: "test-key".to_string(),
        generator_api_url: "http://localhost:0/v1/messages".to_string(),
        port: 0,
        rust_log: "debug".to_string(),
        taxonomy_max_depth: 16,
        taxonomy_max_nodes: 2000,
    }
}

/// Stores and generator handles kept alongside the state for assertions.
pub struct TestContext {
    pub state: AppState,
    pub versions: Arc<MemoryVersionStore>,
    pub artifacts: Arc<MemoryArtifactStore>,
    pub taxonomy: Arc<MemoryTaxonomyStore>,
    pub generator: Arc<ScriptedGenerator>,
}

pub fn test_context(generator: ScriptedGenerator) -> TestContext {
    let versions = Arc::new(MemoryVersionStore::default());
    let artifacts = Arc::new(MemoryArtifactStore::default());
    let taxonomy = Arc::new(MemoryTaxonomyStore::default());
    let generator = Arc::new(generator);
    let state = AppState::new(
        test_config(),
        versions.clone(),
        artifacts.clone(),
        taxonomy.clone(),
        generator.clone(),
    );
    TestContext {
        state,
        versions,
        artifacts,
        taxonomy,
        generator,
    }
}
