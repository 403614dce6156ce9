//! Operation cache for index calls
//!
//! Memoizes the outcome of each index operation, success or failure,
//! keyed by the index it ran against, the operation and a canonical
//! encoding of its arguments. Every entry carries the time-to-live it was
//! stored with; a later call asking for a shorter ttl treats an older
//! entry as stale and recomputes it.
//!
//! Uses the moka crate for thread-safe, async-compatible caching.
//! Concurrent misses on the same key are coalesced into one computation.
//!
//! Author: hephaex@gmail.com

use crate::cached::OperationError;
use mm_core::CacheConfig;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use moka::Expiry;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ============================================================================
// Cache Keys
// ============================================================================

/// Index operations that can be cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Query,
    Upsert,
    Fetch,
    Update,
    Delete,
    DescribeIndexStats,
}

impl Operation {
    /// Human-readable label used in error messages
    pub fn label(&self) -> &'static str {
        match self {
            Self::Query => "Query",
            Self::Upsert => "Upsert vectors",
            Self::Fetch => "Fetch vectors",
            Self::Update => "Update vector",
            Self::Delete => "Delete vectors",
            Self::DescribeIndexStats => "Describe index stats",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Key for cached operation outcomes
///
/// The index scope and the operation are part of the key, so two indexes
/// sharing one cache never see each other's results, and a query and a
/// fetch whose arguments happen to encode identically never share an entry.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct CacheKey {
    /// Identity of the index the operation ran against
    scope: String,
    operation: Operation,
    /// Canonical JSON of every argument, options included
    args: String,
}

impl CacheKey {
    /// Build a key from serializable arguments
    pub fn new(
        scope: impl Into<String>,
        operation: Operation,
        args: &impl Serialize,
    ) -> serde_json::Result<Self> {
        let value = serde_json::to_value(args)?;
        Ok(Self {
            scope: scope.into(),
            operation,
            args: canonical_json(&value),
        })
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }
}

/// Render JSON with object keys sorted at every level
fn canonical_json(value: &serde_json::Value) -> String {
    use serde_json::Value;

    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let body: Vec<String> = entries
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), canonical_json(v)))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}

// ============================================================================
// Cached Values
// ============================================================================

/// A memoized outcome, the ttl it was stored with and when it was stored
#[derive(Debug, Clone)]
struct CachedOutcome {
    outcome: Result<serde_json::Value, OperationError>,
    ttl: Duration,
    stored_at: Instant,
}

impl CachedOutcome {
    /// Still usable by a caller that accepts results up to `ttl` old
    fn is_fresh_for(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() <= ttl
    }
}

/// Expires each entry after its own ttl
struct PerEntryTtl;

impl Expiry<CacheKey, CachedOutcome> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &CachedOutcome,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &CachedOutcome,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

// ============================================================================
// Operation Cache
// ============================================================================

/// Process-wide cache of index operation outcomes
///
/// Cheap to clone; clones share the same storage. Construct once at
/// startup and hand clones to every [`crate::CachedIndex`].
#[derive(Clone)]
pub struct OperationCache {
    cache: Cache<CacheKey, CachedOutcome>,
    stats: Arc<CacheStats>,
}

impl OperationCache {
    /// Create a new cache with default configuration
    pub fn new() -> Self {
        Self::with_config(&CacheConfig::default())
    }

    /// Create a new cache with custom configuration
    pub fn with_config(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self {
            cache,
            stats: Arc::new(CacheStats::new("operation")),
        }
    }

    /// Return the cached outcome for `key`, or run `compute` and cache it
    ///
    /// Failures are cached like successes. An entry older than `ttl` is
    /// recomputed even if it was stored with a longer ttl; a recomputed
    /// entry takes the new ttl. Calls on the same key run one at a time,
    /// so concurrent misses compute once.
    pub async fn get_or_compute<Fut>(
        &self,
        key: CacheKey,
        ttl: Duration,
        compute: Fut,
    ) -> Result<serde_json::Value, OperationError>
    where
        Fut: Future<Output = Result<serde_json::Value, OperationError>>,
    {
        let operation = key.operation();
        let result = self
            .cache
            .entry(key)
            .and_compute_with(|existing| async move {
                match existing {
                    Some(entry) if entry.value().is_fresh_for(ttl) => Op::Nop,
                    _ => Op::Put(CachedOutcome {
                        outcome: compute.await,
                        ttl,
                        stored_at: Instant::now(),
                    }),
                }
            })
            .await;

        let entry = match result {
            CompResult::Unchanged(entry) => {
                self.stats.record_hit();
                tracing::debug!(%operation, "Operation cache hit");
                entry
            }
            CompResult::Inserted(entry) | CompResult::ReplacedWith(entry) => {
                self.stats.record_miss();
                tracing::debug!(%operation, ttl_secs = ttl.as_secs(), "Operation cache miss");
                entry
            }
            CompResult::Removed(_) | CompResult::StillNone(_) => {
                return Err(OperationError::new(operation, "cache entry was not stored"));
            }
        };

        entry.into_value().outcome
    }

    /// Check if an unexpired outcome exists for `key`
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.cache.contains_key(key)
    }

    /// Get cache statistics
    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// Get current cache size
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for OperationCache {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Cache Statistics
// ============================================================================

/// Statistics for cache performance monitoring
#[derive(Debug)]
pub struct CacheStats {
    name: String,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Misses, i.e. calls that reached the remote index
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn total_requests(&self) -> u64 {
        self.hits() + self.misses()
    }

    /// Calculate hit rate (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }

    /// Get a summary report
    pub fn report(&self) -> CacheStatsReport {
        CacheStatsReport {
            name: self.name.clone(),
            hits: self.hits(),
            misses: self.misses(),
            total_requests: self.total_requests(),
            hit_rate: self.hit_rate(),
        }
    }
}

/// Serializable cache statistics report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatsReport {
    pub name: String,
    pub hits: u64,
    pub misses: u64,
    pub total_requests: u64,
    pub hit_rate: f64,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn key(operation: Operation, args: serde_json::Value) -> CacheKey {
        CacheKey::new("movies", operation, &args).unwrap()
    }

    #[test]
    fn test_canonical_key_ignores_field_order() {
        let a: serde_json::Value =
            serde_json::from_str(r#"{"topK": 10, "opts": {"b": 1, "a": 2}}"#).unwrap();
        let b: serde_json::Value =
            serde_json::from_str(r#"{"opts": {"a": 2, "b": 1}, "topK": 10}"#).unwrap();

        assert_eq!(key(Operation::Query, a), key(Operation::Query, b));
    }

    #[test]
    fn test_operation_is_part_of_key() {
        let args = json!({"ids": ["1"]});
        assert_ne!(
            key(Operation::Query, args.clone()),
            key(Operation::Fetch, args)
        );
    }

    #[test]
    fn test_scope_is_part_of_key() {
        let args = json!({"topK": 3});
        let movies = CacheKey::new("movies", Operation::Query, &args).unwrap();
        let shows = CacheKey::new("shows", Operation::Query, &args).unwrap();
        assert_ne!(movies, shows);
        assert_eq!(shows.scope(), "shows");
    }

    #[test]
    fn test_operation_labels() {
        assert_eq!(Operation::Query.label(), "Query");
        assert_eq!(Operation::DescribeIndexStats.to_string(), "Describe index stats");
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let cache = OperationCache::new();
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(60);

        for _ in 0..2 {
            let value = cache
                .get_or_compute(key(Operation::Query, json!([1])), ttl, async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({"matches": []}))
                })
                .await
                .unwrap();
            assert_eq!(value, json!({"matches": []}));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
    }

    #[tokio::test]
    async fn test_errors_are_cached() {
        let cache = OperationCache::new();
        let calls = AtomicUsize::new(0);
        let k = key(Operation::Fetch, json!({"ids": []}));

        for _ in 0..2 {
            let result = cache
                .get_or_compute(k.clone(), Duration::from_secs(60), async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(OperationError::new(Operation::Fetch, "'ids' must be provided."))
                })
                .await;
            assert!(result.is_err());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let cache = OperationCache::new();
        let calls = AtomicUsize::new(0);
        let k = key(Operation::DescribeIndexStats, json!({}));
        let ttl = Duration::from_millis(50);

        cache
            .get_or_compute(k.clone(), ttl, async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!(1))
            })
            .await
            .unwrap();
        assert!(cache.contains(&k));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!cache.contains(&k));

        let value = cache
            .get_or_compute(k, ttl, async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!(2))
            })
            .await
            .unwrap();

        assert_eq!(value, json!(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_shorter_ttl_refreshes_older_entry() {
        let cache = OperationCache::new();
        let calls = AtomicUsize::new(0);
        let k = key(Operation::Query, json!({"vector": [0.3]}));

        let first = cache
            .get_or_compute(k.clone(), Duration::from_secs(3600), async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!("old"))
            })
            .await
            .unwrap();
        assert_eq!(first, json!("old"));

        tokio::time::sleep(Duration::from_millis(150)).await;

        let refreshed = cache
            .get_or_compute(k.clone(), Duration::from_millis(50), async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!("new"))
            })
            .await
            .unwrap();
        assert_eq!(refreshed, json!("new"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // The fresh entry satisfies a longer ttl without another call
        let again = cache
            .get_or_compute(k, Duration::from_secs(3600), async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!("unused"))
            })
            .await
            .unwrap();
        assert_eq!(again, json!("new"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().misses(), 2);
        assert_eq!(cache.stats().hits(), 1);
    }

    #[test]
    fn test_hit_rate_empty() {
        let cache = OperationCache::new();
        assert_eq!(cache.stats().hit_rate(), 0.0);
        assert_eq!(cache.stats().report().name, "operation");
    }
}
