//! Execution of one flushed batch and distribution of its results.

use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

use crate::cache::ResultCache;
use crate::error::LoaderError;

use super::collector::PendingBatch;
use super::scheduler::FlushReason;
use super::types::BatchFn;
use super::{METRIC_BATCHES, METRIC_BATCH_KEYS, METRIC_FETCH_ERRORS};

pub(crate) struct BatchExecutor<K, V, F> {
    fetcher: Arc<F>,
    cache: Arc<dyn ResultCache<K, V>>,
}

impl<K, V, F> BatchExecutor<K, V, F>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: BatchFn<K, V>,
{
    pub fn new(fetcher: Arc<F>, cache: Arc<dyn ResultCache<K, V>>) -> Self {
        Self { fetcher, cache }
    }

    /// Fetches the batch's keys and resolves every waiter in it.
    ///
    /// Successes are written to the cache before their waiter resolves.
    /// Every waiter slot is consumed or dropped by the time this returns.
    pub async fn execute(&self, batch: PendingBatch<K, V>, reason: FlushReason) {
        let PendingBatch {
            generation,
            keys,
            mut waiters,
            ..
        } = batch;

        tracing::debug!(
            generation,
            batch_size = keys.len(),
            trigger = reason.as_str(),
            "flushing batch"
        );
        metrics::counter!(METRIC_BATCHES, "trigger" => reason.as_str()).increment(1);
        metrics::histogram!(METRIC_BATCH_KEYS).record(keys.len() as f64);

        let mut output = self.fetcher.load(&keys).await;
        if output.len() < keys.len() {
            tracing::warn!(
                generation,
                requested = keys.len(),
                returned = output.len(),
                "batch function returned fewer entries than keys"
            );
        }

        for (index, key) in keys.into_iter().enumerate() {
            let outcome = match output.take(index) {
                Some(Ok(value)) => {
                    self.cache.put(key.clone(), value.clone());
                    Ok(value)
                }
                Some(Err(err)) => {
                    metrics::counter!(METRIC_FETCH_ERRORS).increment(1);
                    Err(LoaderError::Backend(err))
                }
                None => Err(LoaderError::MissingResult {
                    key: key.to_string(),
                }),
            };

            if let Some(slot) = waiters.remove(&key) {
                slot.resolve(outcome);
            }
        }
    }
}
