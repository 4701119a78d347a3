use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::record::EntityKind;

pub const CONFIG_PATH_ENV: &str = "HELIX_CONFIG_PATH";
pub const CONFIG_FILENAME: &str = "helix_gateway.toml";
const ENV_PREFIX: &str = "HELIX_";

// The helixdb service host as named in docker-compose, on its default port
pub const DEFAULT_ENDPOINT: &str = "http://helixdb:6969";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the HelixDB gateway. Queries are POSTed to `{endpoint}/{query_name}`.
    pub endpoint: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Sent as `x-api-key` when set.
    pub api_key: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 30,
            api_key: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    pub document_batch_size: usize,
    pub code_example_batch_size: usize,
    /// Upper bound on batches flushed at the same time, per entity kind.
    pub max_concurrent_batches: usize,
    /// Upper bound on blocking client calls in flight across the process.
    pub worker_threads: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            document_batch_size: 50,
            code_example_batch_size: 20,
            max_concurrent_batches: 4,
            worker_threads: 8,
        }
    }
}

impl IngestConfig {
    pub fn batch_size(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Document => self.document_batch_size,
            EntityKind::CodeExample => self.code_example_batch_size,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// Result limit used by the CLI when none is given.
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { default_limit: 5 }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GatewayConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Picks the config file: `HELIX_CONFIG_PATH` if set (it must exist), then
/// `helix_gateway.toml` in the working directory, then the platform config dir.
fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(env_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(&env_path);
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "Config file not found at {}: {}",
                CONFIG_PATH_ENV,
                env_path
            ));
        }
        log::info!("{} is set: {}", CONFIG_PATH_ENV, env_path);
        return Ok(path);
    }

    let local = PathBuf::from(CONFIG_FILENAME);
    if local.exists() {
        return Ok(local);
    }

    let fallback = ProjectDirs::from("com", "helixdb", "helix-gateway")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
        .filter(|path| path.exists())
        .unwrap_or(local);
    log::info!(
        "{} not set, falling back to: {}",
        CONFIG_PATH_ENV,
        fallback.display()
    );
    Ok(fallback)
}

/// Loads the config: defaults, then the TOML file, then `HELIX_*` env vars
/// (nested with `__`, e.g. `HELIX_CLIENT__ENDPOINT`).
pub fn load_config() -> Result<GatewayConfig> {
    let config_path = resolve_config_path()?;

    let figment = Figment::new()
        .merge(Serialized::defaults(GatewayConfig::default()))
        .merge(Toml::file(&config_path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: GatewayConfig = figment
        .extract()
        .context("Failed to extract GatewayConfig")?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &GatewayConfig) -> Result<()> {
    if config.client.endpoint.trim().is_empty() {
        return Err(anyhow::anyhow!("Configured client.endpoint cannot be empty"));
    }
    if config.client.timeout_secs == 0 {
        return Err(anyhow::anyhow!("client.timeout_secs must be greater than zero"));
    }
    let ingest = &config.ingest;
    for (name, value) in [
        ("ingest.document_batch_size", ingest.document_batch_size),
        ("ingest.code_example_batch_size", ingest.code_example_batch_size),
        ("ingest.max_concurrent_batches", ingest.max_concurrent_batches),
        ("ingest.worker_threads", ingest.worker_threads),
        ("search.default_limit", config.search.default_limit),
    ] {
        if value == 0 {
            return Err(anyhow::anyhow!("{} must be greater than zero", name));
        }
    }
    Ok(())
}
