//! Movie Matcher Configuration Management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for development.
//!
//! Author: hephaex@gmail.com

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Index used when neither config nor the secret store names one
pub const DEFAULT_INDEX_NAME: &str = "movies";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Remote index connection
    pub pinecone: PineconeConfig,

    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Offline batch indexer configuration
    pub indexer: IndexerConfig,

    /// Operation cache configuration
    pub cache: CacheConfig,

    /// Local movie dataset
    pub dataset: DatasetConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(self) -> Result<Self, ConfigError> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Pinecone
        if let Some(key) = lookup("PINECONE_API_KEY") {
            self.pinecone.api_key = Some(key);
        }
        if let Some(env) = lookup("PINECONE_ENVIRONMENT").or_else(|| lookup("PINECONE_REGION")) {
            self.pinecone.environment = Some(env);
        }
        if let Some(name) = lookup("PINECONE_INDEX") {
            self.pinecone.index_name = Some(name);
        }
        if let Some(host) = lookup("PINECONE_INDEX_HOST") {
            self.pinecone.index_host = Some(host);
        }

        // Embeddings
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.embedding.openai_api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.embedding.base_url = url;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }

        // Indexer
        if let Some(size) = lookup("INDEXER_BATCH_SIZE") {
            self.indexer.batch_size = parse_value("INDEXER_BATCH_SIZE", size)?;
        }
        if let Some(delay) = lookup("INDEXER_RETRY_DELAY_SECS") {
            self.indexer.retry_delay_secs = parse_value("INDEXER_RETRY_DELAY_SECS", delay)?;
        }

        // Dataset
        if let Some(path) = lookup("MOVIE_DATASET") {
            self.dataset.path = PathBuf::from(path);
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(self)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Remote vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PineconeConfig {
    /// Connection name; selects the `[connections.<name>]` table in the secrets file
    pub connection_name: String,

    /// API key (falls back to the secret store)
    pub api_key: Option<String>,

    /// Project environment / region, e.g. `us-west1-gcp`
    pub environment: Option<String>,

    /// Index name (falls back to the secret store, then [`DEFAULT_INDEX_NAME`])
    pub index_name: Option<String>,

    /// Explicit data-plane host for the configured index; skips host discovery
    pub index_host: Option<String>,

    /// Controller URL template; `{environment}` is substituted
    pub controller_url: String,

    /// Secrets file consulted for parameters not given explicitly
    pub secrets_file: Option<PathBuf>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            connection_name: "pinecone".to_string(),
            api_key: None,
            environment: None,
            index_name: None,
            index_host: None,
            controller_url: "https://controller.{environment}.pinecone.io".to_string(),
            secrets_file: None,
            timeout_secs: 30,
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// OpenAI API base URL (for compatible APIs)
    pub base_url: String,

    /// Embedding model name
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-ada-002".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Batch indexer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Records per upsert
    pub batch_size: usize,

    /// Fixed delay between upsert retries, in seconds
    pub retry_delay_secs: u64,

    /// Maximum recursion depth for oversized-text splitting (unbounded when unset)
    pub max_split_depth: Option<u32>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            // Small batches prevent connection throttling
            batch_size: 20,
            retry_delay_secs: 5,
            max_split_depth: None,
        }
    }
}

/// Operation cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached operation outcomes
    pub max_capacity: u64,

    /// Default time-to-live for cached outcomes (in seconds)
    pub default_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 1_000,
            default_ttl_secs: 3600,
        }
    }
}

/// Local dataset configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Path to the movie plots CSV
    pub path: PathBuf,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/wiki_movie_plots_deduped_with_id.csv"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.indexer.batch_size, 20);
        assert_eq!(config.indexer.retry_delay_secs, 5);
        assert_eq!(config.cache.default_ttl_secs, 3600);
        assert_eq!(config.embedding.model, "text-embedding-ada-002");
        assert_eq!(config.pinecone.index_name, None);
    }

    #[test]
    fn test_env_override() {
        let vars: HashMap<&str, &str> = [
            ("PINECONE_API_KEY", "pk-test"),
            ("PINECONE_REGION", "us-west1-gcp"),
            ("INDEXER_BATCH_SIZE", "50"),
        ]
        .into_iter()
        .collect();

        let config = AppConfig::default()
            .apply_env(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.pinecone.api_key.as_deref(), Some("pk-test"));
        assert_eq!(config.pinecone.environment.as_deref(), Some("us-west1-gcp"));
        assert_eq!(config.indexer.batch_size, 50);
    }

    #[test]
    fn test_env_invalid_number() {
        let result = AppConfig::default().apply_env(|k| {
            (k == "INDEXER_RETRY_DELAY_SECS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_partial_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[pinecone]\nindex_name = \"films\"\n\n[cache]\ndefault_ttl_secs = 60"
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.pinecone.index_name.as_deref(), Some("films"));
        assert_eq!(config.cache.default_ttl_secs, 60);
        assert_eq!(config.cache.max_capacity, 1_000);
        assert_eq!(config.indexer.batch_size, 20);
    }

    #[test]
    fn test_missing_file() {
        let result = AppConfig::from_file("/nonexistent/mm.toml");
        assert!(matches!(result, Err(ConfigError::FileReadError { .. })));
    }
}
