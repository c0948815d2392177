//! Application configuration for ragline.
//!
//! User config lives at `~/.ragline/ragline.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RaglineError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "ragline.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".ragline";

// ---------------------------------------------------------------------------
// Config structs (matching ragline.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Pipeline defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Remote model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Fetcher settings.
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Number of documents retrievers return.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Splitter window size in words.
    #[serde(default = "default_split_words")]
    pub split_words: usize,

    /// Splitter overlap in words.
    #[serde(default = "default_split_overlap")]
    pub split_overlap: usize,

    /// Retriever kind: "bm25" or "embedding".
    #[serde(default = "default_retriever")]
    pub retriever: String,

    /// Answer mode: "generative" or "extractive".
    #[serde(default = "default_mode")]
    pub mode: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            split_words: default_split_words(),
            split_overlap: default_split_overlap(),
            retriever: default_retriever(),
            mode: default_mode(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_split_words() -> usize {
    200
}
fn default_split_overlap() -> usize {
    20
}
fn default_retriever() -> String {
    "bm25".into()
}
fn default_mode() -> String {
    "generative".into()
}

/// `[model]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Chat model id for the generator.
    #[serde(default = "default_model")]
    pub model: String,

    /// OpenAI-compatible API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Embedding model id for the embedding retriever.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            base_url: default_base_url(),
            embedding_model: default_embedding_model(),
        }
    }
}

fn default_api_key_env() -> String {
    "RAGLINE_API_KEY".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum concurrent HTTP requests.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Minimum ms between requests.
    #[serde(default)]
    pub delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
            delay_ms: 0,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_concurrency() -> u32 {
    4
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.ragline/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| RaglineError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.ragline/ragline.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RaglineError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| RaglineError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| RaglineError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| RaglineError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RaglineError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the model API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.model.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(RaglineError::config(format!(
            "model API key not found. Set the {var_name} environment variable."
        ))),
    }
}
