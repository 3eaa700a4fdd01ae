//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration lives in a small TOML file. Missing or unreadable
//! files never stop startup: a warning is logged and built-in defaults apply.
//!
//! # Root folder priority
//! 1. Command-line argument (highest priority)
//! 2. `CURIO_ROOT_FOLDER` environment variable
//! 3. TOML `root_folder`
//! 4. OS-dependent default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CURIO_CONFIG";

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV_VAR: &str = "CURIO_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "curio.db";

/// Upper bound on concurrent content-generation calls
pub const MAX_CONTENT_CONCURRENCY: usize = 5;

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder for the database and cached artifacts
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    /// API keys by backend name (`anthropic`, `openai`, `gemini`)
    #[serde(default)]
    pub api_keys: BTreeMap<String, String>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Generation backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Backend used when a request does not name one
    #[serde(default = "default_backend")]
    pub default_backend: String,

    /// Per-call timeout for backend requests
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Upper bound for a whole job
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,

    /// Concurrent content-generation calls (1 = sequential)
    #[serde(default = "default_content_concurrency")]
    pub content_concurrency: usize,

    /// Output token ceiling per call
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Lifetime of cached model selections
    #[serde(default = "default_model_cache_ttl_secs")]
    pub model_cache_ttl_secs: u64,

    /// Model overrides by backend name
    #[serde(default)]
    pub models: BTreeMap<String, String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5780
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_backend() -> String {
    "anthropic".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_job_timeout_secs() -> u64 {
    1800
}

fn default_content_concurrency() -> usize {
    1
}

fn default_max_output_tokens() -> u32 {
    8192
}

fn default_model_cache_ttl_secs() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_backend: default_backend(),
            request_timeout_secs: default_request_timeout_secs(),
            job_timeout_secs: default_job_timeout_secs(),
            content_concurrency: default_content_concurrency(),
            max_output_tokens: default_max_output_tokens(),
            model_cache_ttl_secs: default_model_cache_ttl_secs(),
            models: BTreeMap::new(),
        }
    }
}

impl GenerationConfig {
    /// Content concurrency clamped to `1..=MAX_CONTENT_CONCURRENCY`
    pub fn effective_concurrency(&self) -> usize {
        self.content_concurrency.clamp(1, MAX_CONTENT_CONCURRENCY)
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Read and parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Load configuration, falling back to defaults when no usable file exists
    pub fn load_or_default(cli_path: Option<&Path>) -> Self {
        let Some(path) = resolve_config_path(cli_path) else {
            info!("No configuration file found, using built-in defaults");
            return Self::default();
        };

        match Self::load(&path) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Ignoring configuration file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Locate the configuration file: CLI path → `CURIO_CONFIG` → user config dir
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("curio").join("curio-ai.toml"))
        .filter(|p| p.exists())
}

/// Resolve the root folder following the documented priority order
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("curio"))
        .unwrap_or_else(|| PathBuf::from("./curio_data"))
}

/// Database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}
