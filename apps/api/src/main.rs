mod config;
mod db;
mod errors;
mod generation;
mod llm_client;
mod routes;
mod state;
mod taxonomy;
mod versioning;

#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::generation::artifacts::PgArtifactStore;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::taxonomy::PgTaxonomyStore;
use crate::versioning::PgVersionStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting LearnForge API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url, config.db_max_connections).await?;

    // Initialize the generator client
    let generator = LlmClient::new(
        config.generator_api_url.clone(),
        config.generator_api_key.clone(),
    )?;
    info!("Generator client initialized ({})", config.generator_api_url);

    info!(
        "Taxonomy limits: depth {} nodes {}",
        config.taxonomy_max_depth, config.taxonomy_max_nodes
    );

    let port = config.port;
    let state = AppState::new(
        config,
        Arc::new(PgVersionStore::new(db.clone())),
        Arc::new(PgArtifactStore::new(db.clone())),
        Arc::new(PgTaxonomyStore::new(db)),
        Arc::new(generator),
    );

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS once the admin UI origin is fixed

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
