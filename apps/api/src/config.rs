use anyhow::{Context, Result};

const DEFAULT_GENERATOR_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub generator_api_key: String,
    pub generator_api_url: String,
    pub port: u16,
    pub rust_log: String,
    pub taxonomy_max_depth: usize,
    pub taxonomy_max_nodes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", 10)?,
            generator_api_key: require_env("GENERATOR_API_KEY")?,
            generator_api_url: std::env::var("GENERATOR_API_URL")
                .unwrap_or_else(|_| DEFAULT_GENERATOR_API_URL.to_string()),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            taxonomy_max_depth: parse_env("TAXONOMY_MAX_DEPTH", 16)?,
            taxonomy_max_nodes: parse_env("TAXONOMY_MAX_NODES", 2000)?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
