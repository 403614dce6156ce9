//! Cached, error-normalizing wrapper around a vector index
//!
//! Every operation goes through the same path: build the cache key from
//! all arguments, and on a miss validate the request, call the index and
//! convert the response to plain JSON before caching it. Any failure on
//! that path, bad input or remote error alike, comes back as an
//! [`OperationError`] value; nothing else escapes.
//!
//! Author: hephaex@gmail.com

use crate::cache::{CacheKey, Operation, OperationCache};
use crate::types::{
    Ack, DeleteRequest, DescribeStatsRequest, FetchRequest, FetchResponse, IndexStats,
    QueryRequest, QueryResponse, UpdateRequest, UpsertRequest, UpsertResponse,
};
use crate::VectorIndex;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default lifetime of a cached outcome
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

// ============================================================================
// Operation Errors
// ============================================================================

/// Normalized failure of a wrapped operation
///
/// Displays as `"<operation> failed: <cause>"`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{} failed: {}", .operation.label(), .message)]
pub struct OperationError {
    pub operation: Operation,
    pub message: String,
}

impl OperationError {
    pub fn new(operation: Operation, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }

    /// The `{"error": "..."}` mapping shown to callers
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.to_string() })
    }
}

pub type OperationResult<T> = std::result::Result<T, OperationError>;

// ============================================================================
// Wrapped Requests
// ============================================================================

/// A request that can be sent through [`CachedIndex`]
#[async_trait]
trait IndexRequest: Serialize + Send + Sync + 'static {
    type Response: Serialize + DeserializeOwned + Send;

    const OPERATION: Operation;

    /// Local precondition check, run before the remote call
    fn check(&self) -> std::result::Result<(), String> {
        Ok(())
    }

    async fn send(&self, index: &dyn VectorIndex) -> mm_core::Result<Self::Response>;
}

#[async_trait]
impl IndexRequest for QueryRequest {
    type Response = QueryResponse;
    const OPERATION: Operation = Operation::Query;

    async fn send(&self, index: &dyn VectorIndex) -> mm_core::Result<QueryResponse> {
        index.query(self).await
    }
}

#[async_trait]
impl IndexRequest for UpsertRequest {
    type Response = UpsertResponse;
    const OPERATION: Operation = Operation::Upsert;

    fn check(&self) -> std::result::Result<(), String> {
        if self.vectors.is_empty() {
            return Err("'vectors' must be provided.".to_string());
        }
        Ok(())
    }

    async fn send(&self, index: &dyn VectorIndex) -> mm_core::Result<UpsertResponse> {
        index.upsert(self).await
    }
}

#[async_trait]
impl IndexRequest for FetchRequest {
    type Response = FetchResponse;
    const OPERATION: Operation = Operation::Fetch;

    fn check(&self) -> std::result::Result<(), String> {
        if self.ids.is_empty() {
            return Err("'ids' must be provided.".to_string());
        }
        Ok(())
    }

    async fn send(&self, index: &dyn VectorIndex) -> mm_core::Result<FetchResponse> {
        index.fetch(self).await
    }
}

#[async_trait]
impl IndexRequest for UpdateRequest {
    type Response = Ack;
    const OPERATION: Operation = Operation::Update;

    fn check(&self) -> std::result::Result<(), String> {
        let has_values = self.values.as_ref().is_some_and(|v| !v.is_empty());
        let has_sparse = self.sparse_values.as_ref().is_some_and(|s| !s.indices.is_empty());
        let has_metadata = self.set_metadata.as_ref().is_some_and(|m| !m.is_empty());

        if !(has_values || has_sparse || has_metadata) {
            return Err(
                "At least one of 'values', 'sparse_values', or 'set_metadata' must be provided."
                    .to_string(),
            );
        }
        Ok(())
    }

    async fn send(&self, index: &dyn VectorIndex) -> mm_core::Result<Ack> {
        index.update(self).await
    }
}

#[async_trait]
impl IndexRequest for DeleteRequest {
    type Response = Ack;
    const OPERATION: Operation = Operation::Delete;

    fn check(&self) -> std::result::Result<(), String> {
        let has_ids = self.ids.as_ref().is_some_and(|ids| !ids.is_empty());
        let delete_all = self.delete_all.unwrap_or(false);
        let has_filter = self.filter.as_ref().is_some_and(|f| !f.is_null());

        if !(has_ids || delete_all || has_filter) {
            return Err(
                "At least one of 'ids', 'delete_all', or 'filter' must be provided.".to_string(),
            );
        }
        Ok(())
    }

    async fn send(&self, index: &dyn VectorIndex) -> mm_core::Result<Ack> {
        index.delete(self).await
    }
}

#[async_trait]
impl IndexRequest for DescribeStatsRequest {
    type Response = IndexStats;
    const OPERATION: Operation = Operation::DescribeIndexStats;

    async fn send(&self, index: &dyn VectorIndex) -> mm_core::Result<IndexStats> {
        index.describe_index_stats(self).await
    }
}

// ============================================================================
// Cached Index
// ============================================================================

/// Cached view of a connected index
///
/// `ttl: None` uses the wrapper's default ttl (one hour unless changed
/// with [`CachedIndex::with_default_ttl`]).
#[derive(Clone)]
pub struct CachedIndex {
    index: Arc<dyn VectorIndex>,
    scope: String,
    cache: OperationCache,
    default_ttl: Duration,
}

impl CachedIndex {
    /// Wrap an index handle, sharing `cache` with any other wrappers
    pub fn new(index: Arc<dyn VectorIndex>, cache: OperationCache) -> Self {
        Self {
            scope: index.cache_scope(),
            index,
            cache,
            default_ttl: DEFAULT_TTL,
        }
    }

    /// Set the ttl used when a call passes `None`
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// The underlying index handle
    pub fn index(&self) -> Arc<dyn VectorIndex> {
        Arc::clone(&self.index)
    }

    /// The shared operation cache
    pub fn cache(&self) -> &OperationCache {
        &self.cache
    }

    /// Query the index; returns top-k matches, most similar first
    pub async fn query(
        &self,
        request: QueryRequest,
        ttl: Option<Duration>,
    ) -> OperationResult<QueryResponse> {
        self.run(request, ttl).await
    }

    /// Write vectors into a namespace
    pub async fn upsert(
        &self,
        request: UpsertRequest,
        ttl: Option<Duration>,
    ) -> OperationResult<UpsertResponse> {
        self.run(request, ttl).await
    }

    /// Look up vectors by id
    pub async fn fetch(
        &self,
        request: FetchRequest,
        ttl: Option<Duration>,
    ) -> OperationResult<FetchResponse> {
        self.run(request, ttl).await
    }

    /// Overwrite values and/or merge metadata of one vector
    pub async fn update(&self, request: UpdateRequest, ttl: Option<Duration>) -> OperationResult<Ack> {
        self.run(request, ttl).await
    }

    /// Delete vectors by id, by filter, or all of a namespace
    pub async fn delete(&self, request: DeleteRequest, ttl: Option<Duration>) -> OperationResult<Ack> {
        self.run(request, ttl).await
    }

    /// Vector counts per namespace and index dimensionality
    pub async fn describe_index_stats(
        &self,
        request: DescribeStatsRequest,
        ttl: Option<Duration>,
    ) -> OperationResult<IndexStats> {
        self.run(request, ttl).await
    }

    async fn run<R: IndexRequest>(
        &self,
        request: R,
        ttl: Option<Duration>,
    ) -> OperationResult<R::Response> {
        let operation = R::OPERATION;
        let fail = move |message: String| OperationError::new(operation, message);

        let key = CacheKey::new(self.scope.as_str(), operation, &request)
            .map_err(|e| fail(e.to_string()))?;
        let ttl = ttl.unwrap_or(self.default_ttl);
        let index = Arc::clone(&self.index);

        let value = self
            .cache
            .get_or_compute(key, ttl, async move {
                request.check().map_err(fail)?;

                let response = request.send(index.as_ref()).await.map_err(|e| {
                    tracing::warn!(%operation, index = index.name(), error = %e, "Index operation failed");
                    fail(e.to_string())
                })?;

                serde_json::to_value(response).map_err(|e| fail(e.to_string()))
            })
            .await?;

        serde_json::from_value(value).map_err(|e| fail(e.to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================
