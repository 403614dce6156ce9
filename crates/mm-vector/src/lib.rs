//! MM Vector - Remote vector index access
//!
//! Provides the abstraction over the hosted vector index (Pinecone),
//! connection management, and a cached, error-normalizing wrapper
//! around every index operation.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use mm_core::Result;

pub mod cache;
pub mod cached;
pub mod connection;
pub mod embedding;
pub mod pinecone;
pub mod types;

pub use cache::{CacheKey, CacheStats, CacheStatsReport, Operation, OperationCache};
pub use cached::{CachedIndex, OperationError, OperationResult, DEFAULT_TTL};
pub use connection::{ConnectOptions, ConnectionManager, ConnectionParams, IndexConnector};
pub use embedding::OpenAiEmbedding;
pub use pinecone::{PineconeConnector, PineconeIndex};
pub use types::{
    Ack, DeleteRequest, DescribeStatsRequest, FetchRequest, FetchResponse, IndexStats,
    NamespaceStats, Options, QueryRequest, QueryResponse, UpdateRequest, UpsertRequest,
    UpsertResponse,
};

/// Trait for remote vector index operations
///
/// Implementations talk to the index over the network. Errors are
/// returned as-is; normalization happens in [`CachedIndex`].
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Nearest-neighbor query
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse>;

    /// Insert or overwrite records
    async fn upsert(&self, request: &UpsertRequest) -> Result<UpsertResponse>;

    /// Look up records by id
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse>;

    /// Update a single record
    async fn update(&self, request: &UpdateRequest) -> Result<Ack>;

    /// Delete records by id, filter, or everything in a namespace
    async fn delete(&self, request: &DeleteRequest) -> Result<Ack>;

    /// Per-namespace counts and dimensionality
    async fn describe_index_stats(&self, request: &DescribeStatsRequest) -> Result<IndexStats>;

    /// Index name for logging
    fn name(&self) -> &str;

    /// Identity of the remote index, scoping cached outcomes
    ///
    /// Two handles with the same scope are treated as the same index.
    fn cache_scope(&self) -> String {
        self.name().to_string()
    }
}
