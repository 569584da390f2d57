//! Batching, deduplicating, caching data loader.
//!
//! Callers request values one key at a time; the loader collapses
//! concurrent requests into bulk calls to a [`BatchFn`]:
//!
//! 1. **Cache bypass**: keys already resolved are served from the cache
//! 2. **Dedup**: concurrent requests for a pending key share one waiter
//! 3. **Batching**: distinct keys accumulate until the size threshold is
//!    reached or the wait window elapses, whichever comes first
//!
//! # Cancellation
//!
//! A caller that stops waiting, by dropping its future or through a
//! cancellation token, only ends its own wait. The key stays in its batch,
//! the fetch runs to completion and a successful result is still cached
//! for every other caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use rsload_domain::loader::{BatchFn, BatchOutput, DataLoader, LoaderConfig};
//!
//! struct Users;
//!
//! #[async_trait::async_trait]
//! impl BatchFn<String, User> for Users {
//!     async fn load(&self, keys: &[String]) -> BatchOutput<User> {
//!         BatchOutput::from_results(db::users_by_id(keys).await)
//!     }
//! }
//!
//! let loader = DataLoader::new(Users, LoaderConfig::default());
//! let alice = loader.load("alice".to_string()).await?;
//! ```

mod collector;
mod executor;
mod scheduler;
mod types;
mod waiter;

pub use types::{BatchFn, BatchOutput, LoaderConfig, DEFAULT_MAX_BATCH_SIZE, DEFAULT_WAIT};

use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

use futures::future::join_all;
pub use tokio_util::sync::CancellationToken;

use crate::cache::{MemoryCache, ResultCache};
use crate::error::{LoaderError, LoaderResult};

use collector::{BatchCollector, Enqueued};
use executor::BatchExecutor;
use scheduler::BatchScheduler;
use waiter::Waiter;

pub(crate) const METRIC_CACHE_HITS: &str = "rsload_cache_hits_total";
pub(crate) const METRIC_CACHE_MISSES: &str = "rsload_cache_misses_total";
pub(crate) const METRIC_BATCHES: &str = "rsload_batches_total";
pub(crate) const METRIC_BATCH_KEYS: &str = "rsload_batch_keys";
pub(crate) const METRIC_FETCH_ERRORS: &str = "rsload_fetch_errors_total";

/// Loader that batches and caches lookups against a [`BatchFn`].
///
/// Cloning is cheap; clones share the cache, the pending batch and the
/// batch function.
pub struct DataLoader<K, V, F> {
    inner: Arc<LoaderInner<K, V, F>>,
}

struct LoaderInner<K, V, F> {
    config: LoaderConfig,
    cache: Arc<dyn ResultCache<K, V>>,
    collector: Arc<BatchCollector<K, V>>,
    scheduler: BatchScheduler<K, V, F>,
}

impl<K, V, F> Clone for DataLoader<K, V, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, F> std::fmt::Debug for DataLoader<K, V, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataLoader")
            .field("config", &self.inner.config)
            .field("cached_entries", &self.inner.cache.len())
            .finish()
    }
}

impl<K, V, F> DataLoader<K, V, F>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: BatchFn<K, V>,
{
    /// Creates a loader that owns a fresh [`MemoryCache`].
    pub fn new(fetcher: F, config: LoaderConfig) -> Self {
        Self::with_cache(fetcher, config, Arc::new(MemoryCache::<K, V>::new()))
    }

    /// Creates a loader backed by an externally supplied cache.
    pub fn with_cache(
        fetcher: F,
        config: LoaderConfig,
        cache: Arc<dyn ResultCache<K, V>>,
    ) -> Self {
        let config = config.normalized();
        let collector = Arc::new(BatchCollector::new(config.max_batch_size));
        let executor = Arc::new(BatchExecutor::new(Arc::new(fetcher), Arc::clone(&cache)));
        let scheduler = BatchScheduler::new(Arc::clone(&collector), executor, config.wait);

        Self {
            inner: Arc::new(LoaderInner {
                config,
                cache,
                collector,
                scheduler,
            }),
        }
    }

    /// Loads one key, joining the pending batch on a cache miss.
    ///
    /// Dropping the returned future stops this caller's wait only. A cache
    /// miss must be polled inside a Tokio runtime, since batches run on
    /// spawned tasks; elsewhere it fails with [`LoaderError::NoRuntime`].
    pub async fn load(&self, key: K) -> LoaderResult<V> {
        if let Some(value) = self.cached(&key) {
            return Ok(value);
        }
        let waiter = self.join(&key)?;
        Self::settle(&key, waiter.wait().await)
    }

    /// Loads one key, giving up with [`LoaderError::Cancelled`] when
    /// `token` fires first.
    ///
    /// Has the same runtime requirement as [`DataLoader::load`].
    pub async fn load_with_cancellation(
        &self,
        key: K,
        token: &CancellationToken,
    ) -> LoaderResult<V> {
        if let Some(value) = self.cached(&key) {
            return Ok(value);
        }
        let waiter = self.join(&key)?;
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!(%key, "load cancelled by caller");
                Err(LoaderError::Cancelled)
            }
            outcome = waiter.wait() => Self::settle(&key, outcome),
        }
    }

    /// Loads every key concurrently; results align with `keys`.
    pub async fn load_many<I>(&self, keys: I) -> Vec<LoaderResult<V>>
    where
        I: IntoIterator<Item = K>,
    {
        join_all(keys.into_iter().map(|key| self.load(key))).await
    }

    /// Cancellable form of [`DataLoader::load_many`].
    pub async fn load_many_with_cancellation<I>(
        &self,
        keys: I,
        token: &CancellationToken,
    ) -> Vec<LoaderResult<V>>
    where
        I: IntoIterator<Item = K>,
    {
        join_all(
            keys.into_iter()
                .map(|key| self.load_with_cancellation(key, token)),
        )
        .await
    }

    /// Removes one key from the cache. Pending batches are unaffected.
    pub fn clear(&self, key: &K) {
        self.inner.cache.delete(key);
    }

    /// Empties the cache. Pending batches are unaffected.
    pub fn clear_all(&self) {
        self.inner.cache.clear();
    }

    /// Stores a value directly, bypassing batching.
    pub fn prime(&self, key: K, value: V) {
        self.inner.cache.put(key, value);
    }

    /// Number of keys in the batch currently accumulating.
    pub fn pending_len(&self) -> usize {
        self.inner.collector.pending_len()
    }

    /// The effective configuration, after defaults were applied.
    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    /// The cache this loader reads and writes.
    pub fn cache(&self) -> &Arc<dyn ResultCache<K, V>> {
        &self.inner.cache
    }

    fn cached(&self, key: &K) -> Option<V> {
        let value = self.inner.cache.get(key);
        if value.is_some() {
            tracing::trace!(%key, "cache hit");
            metrics::counter!(METRIC_CACHE_HITS).increment(1);
        } else {
            metrics::counter!(METRIC_CACHE_MISSES).increment(1);
        }
        value
    }

    fn join(&self, key: &K) -> LoaderResult<Waiter<V>> {
        // Checked before enqueueing so a failed spawn cannot strand the key.
        if tokio::runtime::Handle::try_current().is_err() {
            tracing::warn!(%key, "load polled outside a Tokio runtime");
            return Err(LoaderError::NoRuntime {
                key: key.to_string(),
            });
        }
        let Enqueued { waiter, trigger } = self.inner.collector.enqueue(key.clone());
        self.inner.scheduler.schedule(trigger);
        Ok(waiter)
    }

    fn settle(key: &K, outcome: Option<LoaderResult<V>>) -> LoaderResult<V> {
        outcome.unwrap_or_else(|| {
            tracing::error!(%key, "batch ended without resolving key");
            Err(LoaderError::BatchAbandoned {
                key: key.to_string(),
            })
        })
    }
}

/// Registers loader metric descriptions.
///
/// Call once during application startup, after installing a recorder.
///
/// # Metrics Registered
///
/// - `rsload_cache_hits_total` - Loads served from the cache
/// - `rsload_cache_misses_total` - Loads that joined a batch
/// - `rsload_batches_total` - Executed batches, labelled by `trigger`
/// - `rsload_batch_keys` - Distinct keys per executed batch (histogram)
/// - `rsload_fetch_errors_total` - Per-key backend errors
pub fn register_loader_metrics() {
    metrics::describe_counter!(METRIC_CACHE_HITS, "Total number of loads served from cache");
    metrics::describe_counter!(
        METRIC_CACHE_MISSES,
        "Total number of loads that joined a batch"
    );
    metrics::describe_counter!(METRIC_BATCHES, "Total number of executed batches");
    metrics::describe_histogram!(METRIC_BATCH_KEYS, "Distinct keys per executed batch");
    metrics::describe_counter!(
        METRIC_FETCH_ERRORS,
        "Total number of per-key backend errors"
    );
}
