//! Secret stores consulted for connection parameters
//!
//! A connection parameter that is not passed explicitly is looked up by
//! its key name (`api_key`, `environment`, `index_name`, ...).
//!
//! Author: hephaex@gmail.com

use crate::config::ConfigError;
use std::collections::HashMap;
use std::path::PathBuf;

/// Lookup of secrets by key name
pub trait SecretStore: Send + Sync {
    /// Get a secret value, if present
    fn get(&self, key: &str) -> Option<String>;
}

impl SecretStore for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Secrets read from a TOML file
///
/// Values are taken from the `[connections.<name>]` table, e.g.
///
/// ```toml
/// [connections.pinecone]
/// api_key = "..."
/// environment = "us-west1-gcp"
/// index_name = "movies"
/// index_host = "https://movies-abc123.svc.us-west1-gcp.pinecone.io"  # optional
/// ```
#[derive(Debug, Clone, Default)]
pub struct SecretsFile {
    values: HashMap<String, String>,
}

impl SecretsFile {
    /// Load the table for `connection_name` from a secrets file
    pub fn load(path: impl Into<PathBuf>, connection_name: &str) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        Self::parse(&content, connection_name).map_err(|message| ConfigError::ParseError {
            path,
            message,
        })
    }

    /// Parse secrets from TOML text
    pub fn parse(content: &str, connection_name: &str) -> Result<Self, String> {
        let root: toml::Table = toml::from_str(content).map_err(|e| e.to_string())?;

        let values = root
            .get("connections")
            .and_then(|c| c.get(connection_name))
            .and_then(|t| t.as_table())
            .map(|table| {
                table
                    .iter()
                    .map(|(k, v)| {
                        let value = match v {
                            toml::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (k.clone(), value)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self { values })
    }
}

impl SecretStore for SecretsFile {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Secrets read from environment variables
///
/// `get("api_key")` with prefix `PINECONE` reads `PINECONE_API_KEY`.
#[derive(Debug, Clone)]
pub struct EnvSecrets {
    prefix: String,
}

impl EnvSecrets {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Environment variable name for a key
    pub fn var_name(&self, key: &str) -> String {
        format!("{}_{}", self.prefix, key).to_uppercase()
    }
}

impl SecretStore for EnvSecrets {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(self.var_name(key))
            .ok()
            .filter(|v| !v.is_empty())
    }
}
