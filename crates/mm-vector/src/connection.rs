//! Connection management for the remote index
//!
//! Resolves connection parameters (explicit value first, then the secret
//! store), performs the initialization handshake once per parameter set,
//! and hands out the shared index handle afterwards.
//!
//! Author: hephaex@gmail.com

use crate::VectorIndex;
use async_trait::async_trait;
use mm_core::{MmError, Result, SecretStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Establishes a connection to an index
#[async_trait]
pub trait IndexConnector: Send + Sync {
    /// Perform the handshake and return a ready index handle
    ///
    /// Failures are `MmError::ConnectionError` and are not retried.
    async fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn VectorIndex>>;
}

/// Parameters a caller may pass explicitly
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub api_key: Option<String>,
    pub environment: Option<String>,
    pub index_name: Option<String>,
    /// Fixed data-plane host for this index, skipping host discovery
    pub index_host: Option<String>,
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn index_name(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    pub fn index_host(mut self, index_host: impl Into<String>) -> Self {
        self.index_host = Some(index_host.into());
        self
    }
}

/// Fully resolved connection parameters
///
/// `index_host` is optional: when neither the caller nor the secret store
/// names one, the connector discovers it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ConnectionParams {
    pub api_key: String,
    pub environment: String,
    pub index_name: String,
    pub index_host: Option<String>,
}

impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("api_key", &"<redacted>")
            .field("environment", &self.environment)
            .field("index_name", &self.index_name)
            .field("index_host", &self.index_host)
            .finish()
    }
}

/// Owns the index handles of a process
///
/// Each distinct parameter set is initialized at most once; later calls
/// return the same handle. Handles are dropped with the manager.
pub struct ConnectionManager {
    connector: Arc<dyn IndexConnector>,
    secrets: Arc<dyn SecretStore>,
    handles: Mutex<HashMap<ConnectionParams, Arc<dyn VectorIndex>>>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn IndexConnector>, secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            connector,
            secrets,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve every parameter from the options or the secret store
    pub fn resolve(&self, options: &ConnectOptions) -> Result<ConnectionParams> {
        Ok(ConnectionParams {
            api_key: self.lookup("api_key", options.api_key.as_deref())?,
            environment: self.lookup("environment", options.environment.as_deref())?,
            index_name: self.lookup("index_name", options.index_name.as_deref())?,
            index_host: options
                .index_host
                .clone()
                .or_else(|| self.secrets.get("index_host")),
        })
    }

    fn lookup(&self, key: &str, explicit: Option<&str>) -> Result<String> {
        match explicit {
            Some(value) => Ok(value.to_string()),
            None => self.secrets.get(key).ok_or_else(|| {
                MmError::ConfigError(format!(
                    "'{key}' was not provided and is missing from the secret store"
                ))
            }),
        }
    }

    /// Get the handle for these options, connecting on first use
    pub async fn connect(&self, options: &ConnectOptions) -> Result<Arc<dyn VectorIndex>> {
        let params = self.resolve(options)?;

        // Held across the handshake so concurrent callers never connect twice
        let mut handles = self.handles.lock().await;
        if let Some(handle) = handles.get(&params) {
            return Ok(Arc::clone(handle));
        }

        tracing::info!(
            index = %params.index_name,
            environment = %params.environment,
            "Connecting to vector index"
        );
        let handle = self.connector.connect(&params).await?;
        handles.insert(params, Arc::clone(&handle));

        Ok(handle)
    }

    /// Number of live handles
    pub async fn connection_count(&self) -> usize {
        self.handles.lock().await.len()
    }
}
