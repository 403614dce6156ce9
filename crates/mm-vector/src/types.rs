//! Request and response types for index operations
//!
//! Requests serialize to the Pinecone data-plane wire format. Passthrough
//! options are flattened into the request body verbatim.
//!
//! Author: hephaex@gmail.com

use mm_core::{Match, Metadata, SparseValues, VectorRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Passthrough options forwarded to the remote call
///
/// A `BTreeMap` so that two calls naming the same options in a different
/// order produce the same cache key.
pub type Options = BTreeMap<String, serde_json::Value>;

// ============================================================================
// Query
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub vector: Vec<f32>,

    pub top_k: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<serde_json::Value>,

    #[serde(flatten)]
    pub options: Options,
}

impl QueryRequest {
    pub fn new(vector: Vec<f32>, top_k: usize) -> Self {
        Self {
            vector,
            top_k,
            namespace: None,
            filter: None,
            options: Options::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_filter(mut self, filter: serde_json::Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub matches: Vec<Match>,

    #[serde(default)]
    pub namespace: String,
}

// ============================================================================
// Upsert
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertRequest {
    pub vectors: Vec<VectorRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(flatten)]
    pub options: Options,
}

impl UpsertRequest {
    pub fn new(vectors: Vec<VectorRecord>) -> Self {
        Self {
            vectors,
            namespace: None,
            options: Options::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertResponse {
    #[serde(default)]
    pub upserted_count: u64,
}

// ============================================================================
// Fetch
// ============================================================================

/// Fetch is a GET; fields become query parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub ids: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(flatten)]
    pub options: Options,
}

impl FetchRequest {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            namespace: None,
            options: Options::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Query-string pairs for the fetch endpoint
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .ids
            .iter()
            .map(|id| ("ids".to_string(), id.clone()))
            .collect();

        if let Some(ns) = &self.namespace {
            pairs.push(("namespace".to_string(), ns.clone()));
        }

        for (key, value) in &self.options {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            pairs.push((key.clone(), value));
        }

        pairs
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchResponse {
    #[serde(default)]
    pub vectors: BTreeMap<String, VectorRecord>,

    #[serde(default)]
    pub namespace: String,
}

// ============================================================================
// Update
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse_values: Option<SparseValues>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_metadata: Option<Metadata>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(flatten)]
    pub options: Options,
}

impl UpdateRequest {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: None,
            sparse_values: None,
            set_metadata: None,
            namespace: None,
            options: Options::new(),
        }
    }

    pub fn with_values(mut self, values: Vec<f32>) -> Self {
        self.values = Some(values);
        self
    }

    pub fn with_sparse_values(mut self, sparse_values: SparseValues) -> Self {
        self.sparse_values = Some(sparse_values);
        self
    }

    pub fn with_set_metadata(mut self, metadata: Metadata) -> Self {
        self.set_metadata = Some(metadata);
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

// ============================================================================
// Delete
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_all: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<serde_json::Value>,

    #[serde(flatten)]
    pub options: Options,
}

impl DeleteRequest {
    pub fn by_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: Some(ids.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn by_filter(filter: serde_json::Value) -> Self {
        Self {
            filter: Some(filter),
            ..Default::default()
        }
    }

    pub fn all() -> Self {
        Self {
            delete_all: Some(true),
            ..Default::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// Empty acknowledgement returned by update and delete
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ack {}

// ============================================================================
// Describe index stats
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescribeStatsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<serde_json::Value>,

    #[serde(flatten)]
    pub options: Options,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceStats {
    #[serde(default)]
    pub vector_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    #[serde(default)]
    pub namespaces: BTreeMap<String, NamespaceStats>,

    #[serde(default)]
    pub dimension: u32,

    #[serde(default)]
    pub index_fullness: f32,

    #[serde(default)]
    pub total_vector_count: u64,
}
