//! MM Core - Shared models, errors, and traits
//!
//! This crate defines the abstractions used throughout Movie Matcher:
//! - Common error types
//! - Vector records and query matches exchanged with the remote index
//! - The embedding provider trait
//! - Configuration management and secret stores
//!
//! Author: hephaex@gmail.com

pub mod config;
pub mod secrets;

pub use config::{
    AppConfig, CacheConfig, ConfigError, DatasetConfig, EmbeddingConfig, IndexerConfig,
    LoggingConfig, PineconeConfig, DEFAULT_INDEX_NAME,
};
pub use secrets::{EnvSecrets, SecretStore, SecretsFile};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for Movie Matcher operations
#[derive(Error, Debug)]
pub enum MmError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Index error: {0}")]
    IndexError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Dataset error: {0}")]
    DatasetError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MmError>;

// ============================================================================
// Vector Models
// ============================================================================

/// Free-form metadata attached to a vector
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Sparse vector representation (parallel index/value arrays)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseValues {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

/// A record stored in the remote index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorRecord {
    /// Record identity; uniqueness is enforced by the index
    pub id: String,

    /// Dense embedding values
    #[serde(default)]
    pub values: Vec<f32>,

    /// Optional sparse values for hybrid search
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse_values: Option<SparseValues>,

    /// Optional metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl VectorRecord {
    /// Create a dense record without metadata
    pub fn new(id: impl Into<String>, values: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            values,
            sparse_values: None,
            metadata: None,
        }
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A single nearest-neighbor match
///
/// Higher scores are more similar. Matches keep the order the index
/// returned them in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: String,

    pub score: f32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse_values: Option<SparseValues>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Match {
    /// Create a match carrying only id and score
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
            values: Vec::new(),
            sparse_values: None,
            metadata: None,
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for text embedding providers
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Model name, for logging
    fn model(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================
