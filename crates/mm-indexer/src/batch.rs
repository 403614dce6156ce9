//! Batch upsert of embedded records
//!
//! Records are embedded one by one and collected into fixed-size batches.
//! A failed upsert is retried with the same batch after a fixed delay,
//! with no attempt limit: the indexer favors finishing over finishing fast.
//!
//! Author: hephaex@gmail.com

use crate::split::{embed_with_fallback, SplitPolicy};
use mm_core::{EmbeddingProvider, IndexerConfig, VectorRecord};
use mm_vector::{UpsertRequest, VectorIndex};
use std::sync::Arc;
use std::time::Duration;

/// Default records per upsert
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Default delay between upsert attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Summary of an indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Records upserted
    pub indexed: usize,
    /// Records whose text could not be embedded at all
    pub skipped: usize,
    /// Upsert calls that succeeded
    pub batches: usize,
    /// Failed upsert attempts that were retried
    pub retries: u64,
}

/// Populates the remote index from `(id, text)` pairs
pub struct BatchIndexer {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    retry_delay: Duration,
    split: SplitPolicy,
    namespace: Option<String>,
}

impl BatchIndexer {
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            index,
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
            retry_delay: DEFAULT_RETRY_DELAY,
            split: SplitPolicy::default(),
            namespace: None,
        }
    }

    /// Create from config
    pub fn from_config(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &IndexerConfig,
    ) -> Self {
        let mut indexer = Self::new(index, embedder)
            .with_batch_size(config.batch_size)
            .with_retry_delay(Duration::from_secs(config.retry_delay_secs));
        indexer.split = SplitPolicy {
            max_depth: config.max_split_depth,
        };
        indexer
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_split_policy(mut self, policy: SplitPolicy) -> Self {
        self.split = policy;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Embed and upsert every item, flushing every `batch_size` records
    pub async fn run<I>(&self, items: I) -> IndexReport
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut report = IndexReport::default();
        let mut batch: Vec<VectorRecord> = Vec::with_capacity(self.batch_size);

        for (id, text) in items {
            match embed_with_fallback(self.embedder.as_ref(), &text, self.split).await {
                Ok(values) => batch.push(VectorRecord::new(id, values)),
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Skipping record that could not be embedded");
                    report.skipped += 1;
                    continue;
                }
            }

            if batch.len() == self.batch_size {
                self.flush(&mut batch, &mut report).await;
            }
        }

        if !batch.is_empty() {
            self.flush(&mut batch, &mut report).await;
        }

        tracing::info!(
            indexed = report.indexed,
            skipped = report.skipped,
            batches = report.batches,
            retries = report.retries,
            "Indexing complete"
        );
        report
    }

    async fn flush(&self, batch: &mut Vec<VectorRecord>, report: &mut IndexReport) {
        let attempts = self.upsert_with_retry(batch).await;
        report.indexed += batch.len();
        report.batches += 1;
        report.retries += u64::from(attempts - 1);
        batch.clear();
    }

    /// Upsert `batch`, retrying until it succeeds; returns the attempt count
    pub async fn upsert_with_retry(&self, batch: &[VectorRecord]) -> u32 {
        let mut request = UpsertRequest::new(batch.to_vec());
        request.namespace = self.namespace.clone();

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.index.upsert(&request).await {
                Ok(response) => {
                    tracing::debug!(
                        size = batch.len(),
                        upserted = response.upserted_count,
                        attempts,
                        "Batch upserted"
                    );
                    return attempts;
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        attempt = attempts,
                        "Encountered an error, retrying in {}s",
                        self.retry_delay.as_secs()
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }
}
