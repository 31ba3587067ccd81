use std::sync::Arc;

use crate::config::Config;
use crate::generation::artifacts::ArtifactStore;
use crate::generation::generator::Generator;
use crate::generation::service::GenerationService;
use crate::taxonomy::store::TaxonomyStore;
use crate::versioning::VersionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub versions: Arc<dyn VersionStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub taxonomy: Arc<dyn TaxonomyStore>,
    /// Owns the generator; swap the `Generator` implementation to change providers.
    pub generation: GenerationService,
}

impl AppState {
    pub fn new(
        config: Config,
        versions: Arc<dyn VersionStore>,
        artifacts: Arc<dyn ArtifactStore>,
        taxonomy: Arc<dyn TaxonomyStore>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let generation = GenerationService::new(versions.clone(), generator, artifacts.clone());
        Self {
            config: Arc::new(config),
            versions,
            artifacts,
            taxonomy,
            generation,
        }
    }
}
