//! Application configuration for Dossier.
//!
//! User config lives at `~/.dossier/dossier.toml`.
//! CLI flags override config file values, which override defaults.
//!
//! The file never holds secrets, only the names of the environment variables
//! that do. Runtime configs ([`SearchProviderConfig`], [`LanguageModelConfig`])
//! are resolved here on behalf of the caller and injected into the pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DossierError, Result};
use crate::types::Tier;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "dossier.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".dossier";

// ---------------------------------------------------------------------------
// Config structs (matching dossier.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Web search provider settings.
    #[serde(default)]
    pub search: SearchSettings,

    /// Language-model settings.
    #[serde(default)]
    pub language_model: LanguageModelSettings,

    /// Pipeline behaviour.
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Custom Search JSON API endpoint.
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Name of the env var holding the API key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Name of the env var holding the search engine id (`cx`).
    #[serde(default = "default_engine_id_env")]
    pub engine_id_env: String,

    /// Per-request timeout.
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Minimum ms between two search requests.
    #[serde(default = "default_request_interval")]
    pub request_interval_ms: u64,

    /// Maximum in-flight search requests within a phase.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key_env: default_search_key_env(),
            engine_id_env: default_engine_id_env(),
            timeout_secs: default_search_timeout(),
            request_interval_ms: default_request_interval(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_search_endpoint() -> String {
    "https://www.googleapis.com/customsearch/v1".into()
}
fn default_search_key_env() -> String {
    "GOOGLE_SEARCH_API_KEY".into()
}
fn default_engine_id_env() -> String {
    "GOOGLE_SEARCH_ENGINE_ID".into()
}
fn default_search_timeout() -> u64 {
    10
}
fn default_request_interval() -> u64 {
    150
}
fn default_concurrency() -> usize {
    1
}

/// `[language_model]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageModelSettings {
    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Name of the env var holding the API key.
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,

    /// Model id.
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Retries for transient failures (429, 5xx, transport errors).
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Delay between retries.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for LanguageModelSettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key_env: default_llm_key_env(),
            model: default_model(),
            timeout_secs: default_llm_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

fn default_api_base() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_llm_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_llm_timeout() -> u64 {
    60
}
fn default_retry_attempts() -> u32 {
    2
}
fn default_retry_delay() -> u64 {
    1000
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Drop evidence whose link was already gathered. Off by default.
    #[serde(default)]
    pub dedup_by_link: bool,

    /// Tier used when the CLI is not given one.
    #[serde(default)]
    pub default_tier: Tier,
}

// ---------------------------------------------------------------------------
// Runtime configs (resolved, injected into the pipeline)
// ---------------------------------------------------------------------------

/// Resolved search provider configuration.
#[derive(Debug, Clone)]
pub struct SearchProviderConfig {
    pub endpoint: String,
    pub api_key: String,
    pub engine_id: String,
    pub timeout_secs: u64,
    pub request_interval_ms: u64,
    pub concurrency: usize,
}

impl SearchProviderConfig {
    /// Check credentials and endpoint. Failing this is fatal for a run.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(DossierError::config("search provider API key is not set"));
        }
        if self.engine_id.trim().is_empty() {
            return Err(DossierError::config("search engine id is not set"));
        }
        Url::parse(&self.endpoint).map_err(|e| {
            DossierError::config(format!("invalid search endpoint '{}': {e}", self.endpoint))
        })?;
        Ok(())
    }
}

/// Resolved language-model configuration.
#[derive(Debug, Clone)]
pub struct LanguageModelConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl LanguageModelConfig {
    /// Check credentials and endpoint. Failing this is fatal for a run.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(DossierError::config("language model API key is not set"));
        }
        if self.model.trim().is_empty() {
            return Err(DossierError::config("language model id is not set"));
        }
        Url::parse(&self.api_base).map_err(|e| {
            DossierError::config(format!("invalid model API base '{}': {e}", self.api_base))
        })?;
        Ok(())
    }
}

impl AppConfig {
    /// Resolve the search config, reading credentials from the environment.
    pub fn search_provider(&self) -> SearchProviderConfig {
        self.search_provider_with(|name| std::env::var(name).ok())
    }

    /// Resolve the model config, reading credentials from the environment.
    pub fn language_model(&self) -> LanguageModelConfig {
        self.language_model_with(|name| std::env::var(name).ok())
    }

    /// Resolve the search config with an explicit variable lookup.
    pub fn search_provider_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> SearchProviderConfig {
        let s = &self.search;
        SearchProviderConfig {
            endpoint: s.endpoint.clone(),
            api_key: lookup(&s.api_key_env).unwrap_or_default(),
            engine_id: lookup(&s.engine_id_env).unwrap_or_default(),
            timeout_secs: s.timeout_secs,
            request_interval_ms: s.request_interval_ms,
            concurrency: s.concurrency.max(1),
        }
    }

    /// Resolve the model config with an explicit variable lookup.
    pub fn language_model_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> LanguageModelConfig {
        let l = &self.language_model;
        LanguageModelConfig {
            api_base: l.api_base.clone(),
            api_key: lookup(&l.api_key_env).unwrap_or_default(),
            model: l.model.clone(),
            timeout_secs: l.timeout_secs,
            retry_attempts: l.retry_attempts,
            retry_delay_ms: l.retry_delay_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.dossier/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DossierError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.dossier/dossier.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| DossierError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DossierError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DossierError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DossierError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DossierError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
