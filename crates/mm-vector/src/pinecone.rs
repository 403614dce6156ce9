//! Pinecone implementation of the vector index
//!
//! Talks to the Pinecone REST data plane. The connector performs the
//! initialization handshake: with only an environment it asks the
//! environment's controller who the key belongs to and derives the index
//! host from the project id; when the connection parameters name a host
//! it probes the index there instead.
//!
//! Author: hephaex@gmail.com

use crate::connection::{ConnectionParams, IndexConnector};
use crate::types::{
    Ack, DeleteRequest, DescribeStatsRequest, FetchRequest, FetchResponse, IndexStats,
    QueryRequest, QueryResponse, UpdateRequest, UpsertRequest, UpsertResponse,
};
use crate::VectorIndex;
use async_trait::async_trait;
use mm_core::{MmError, PineconeConfig, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const API_KEY_HEADER: &str = "Api-Key";

// ============================================================================
// Index Client
// ============================================================================

/// Pinecone data-plane client for one index
pub struct PineconeIndex {
    client: Client,
    host: String,
    api_key: String,
    name: String,
}

impl PineconeIndex {
    /// Create a client for the index served at `host`
    pub fn new(
        client: Client,
        host: impl Into<String>,
        api_key: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            host: host.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            name: name.into(),
        }
    }

    /// Data-plane host
    pub fn host(&self) -> &str {
        &self.host
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = self
            .client
            .post(format!("{}{}", self.host, path))
            .header(API_KEY_HEADER, &self.api_key)
            .json(body);

        send(request, path).await
    }
}

/// Send a request and decode the JSON body, mapping failures to index errors
async fn send<R: DeserializeOwned>(request: RequestBuilder, path: &str) -> Result<R> {
    let response = request
        .send()
        .await
        .map_err(|e| MmError::IndexError(format!("Request to {path} failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(MmError::IndexError(format!(
            "{path} returned {status}: {error_text}"
        )));
    }

    response
        .json()
        .await
        .map_err(|e| MmError::IndexError(format!("Failed to parse {path} response: {e}")))
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        self.post("/query", request).await
    }

    async fn upsert(&self, request: &UpsertRequest) -> Result<UpsertResponse> {
        self.post("/vectors/upsert", request).await
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let path = "/vectors/fetch";
        let http = self
            .client
            .get(format!("{}{}", self.host, path))
            .header(API_KEY_HEADER, &self.api_key)
            .query(&request.query_pairs());

        send(http, path).await
    }

    async fn update(&self, request: &UpdateRequest) -> Result<Ack> {
        self.post("/vectors/update", request).await
    }

    async fn delete(&self, request: &DeleteRequest) -> Result<Ack> {
        self.post("/vectors/delete", request).await
    }

    async fn describe_index_stats(&self, request: &DescribeStatsRequest) -> Result<IndexStats> {
        self.post("/describe_index_stats", request).await
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn cache_scope(&self) -> String {
        format!("{}@{}", self.name, self.host)
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Response of the controller's `whoami` action
#[derive(Debug, Deserialize)]
struct WhoAmI {
    project_name: String,
}

/// Connects to Pinecone indexes
pub struct PineconeConnector {
    client: Client,
    controller_url: String,
}

impl PineconeConnector {
    /// Create a connector
    ///
    /// `controller_url` may contain `{environment}`, which is replaced by the
    /// resolved environment at connect time.
    pub fn new(controller_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MmError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            controller_url: controller_url.into(),
        })
    }

    /// Create from config
    pub fn from_config(config: &PineconeConfig) -> Result<Self> {
        Self::new(
            config.controller_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn controller(&self, environment: &str) -> String {
        self.controller_url
            .replace("{environment}", environment)
            .trim_end_matches('/')
            .to_string()
    }

    /// Ask the controller which project the api key belongs to
    async fn whoami(&self, params: &ConnectionParams) -> Result<WhoAmI> {
        let url = format!("{}/actions/whoami", self.controller(&params.environment));

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &params.api_key)
            .send()
            .await
            .map_err(|e| MmError::ConnectionError(format!("Controller unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MmError::ConnectionError(format!(
                "Controller rejected credentials ({status}): {error_text}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| MmError::ConnectionError(format!("Failed to parse whoami response: {e}")))
    }
}

/// Data-plane host of a pod-based index
pub fn index_host(index_name: &str, project: &str, environment: &str) -> String {
    format!("https://{index_name}-{project}.svc.{environment}.pinecone.io")
}

#[async_trait]
impl IndexConnector for PineconeConnector {
    async fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn VectorIndex>> {
        match &params.index_host {
            Some(host) => {
                let index = PineconeIndex::new(
                    self.client.clone(),
                    host.clone(),
                    params.api_key.clone(),
                    params.index_name.clone(),
                );
                index
                    .describe_index_stats(&DescribeStatsRequest::default())
                    .await
                    .map_err(|e| MmError::ConnectionError(format!("Index probe failed: {e}")))?;

                tracing::info!(index = %params.index_name, host = %index.host(), "Connected to index");
                Ok(Arc::new(index))
            }
            None => {
                let who = self.whoami(params).await?;
                let host = index_host(&params.index_name, &who.project_name, &params.environment);

                tracing::info!(index = %params.index_name, host = %host, "Connected to index");
                Ok(Arc::new(PineconeIndex::new(
                    self.client.clone(),
                    host,
                    params.api_key.clone(),
                    params.index_name.clone(),
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_host() {
        assert_eq!(
            index_host("movies", "abc123", "us-west1-gcp"),
            "https://movies-abc123.svc.us-west1-gcp.pinecone.io"
        );
    }

    #[test]
    fn test_controller_substitution() {
        let connector = PineconeConnector::new(
            "https://controller.{environment}.pinecone.io/",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            connector.controller("gcp-starter"),
            "https://controller.gcp-starter.pinecone.io"
        );
    }

    #[test]
    fn test_host_trailing_slash_trimmed() {
        let index = PineconeIndex::new(Client::new(), "http://localhost:5080/", "k", "movies");
        assert_eq!(index.host(), "http://localhost:5080");
        assert_eq!(index.name(), "movies");
    }

    #[test]
    fn test_whoami_parse() {
        let who: WhoAmI = serde_json::from_str(
            r#"{"project_name":"abc123","user_label":"default","user_name":"me"}"#,
        )
        .unwrap();
        assert_eq!(who.project_name, "abc123");
    }

    #[tokio::test]
    async fn test_unreachable_controller_is_connection_error() {
        let connector =
            PineconeConnector::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let params = ConnectionParams {
            api_key: "k".to_string(),
            environment: "local".to_string(),
            index_name: "movies".to_string(),
            index_host: None,
        };

        let err = connector.connect(&params).await.err().unwrap();
        assert!(matches!(err, MmError::ConnectionError(_)));
    }

    #[tokio::test]
    async fn test_pinned_host_is_checked_on_connect() {
        let connector =
            PineconeConnector::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let params = ConnectionParams {
            api_key: "k".to_string(),
            environment: "local".to_string(),
            index_name: "movies".to_string(),
            index_host: Some("http://127.0.0.1:9".to_string()),
        };

        let err = connector.connect(&params).await.err().unwrap();
        assert!(matches!(err, MmError::ConnectionError(ref m) if m.starts_with("Index probe failed")));
    }

    #[test]
    fn test_cache_scope_includes_host() {
        let a = PineconeIndex::new(Client::new(), "https://movies-a.svc.gcp.pinecone.io", "k", "movies");
        let b = PineconeIndex::new(Client::new(), "https://movies-b.svc.gcp.pinecone.io", "k", "movies");
        assert_ne!(a.cache_scope(), b.cache_scope());
        assert_eq!(a.cache_scope(), "movies@https://movies-a.svc.gcp.pinecone.io");
    }
}
