//! Configuration and batch function contract for data loaders.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::BackendError;

/// Default number of keys that triggers an immediate flush.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Default batching window, measured from the first key of a batch.
pub const DEFAULT_WAIT: Duration = Duration::from_millis(16);

/// Loader configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Number of distinct keys at which a pending batch flushes immediately.
    pub max_batch_size: usize,
    /// How long a batch accumulates after its first key before flushing.
    pub wait: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            wait: DEFAULT_WAIT,
        }
    }
}

impl LoaderConfig {
    /// Sets the size threshold.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// Sets the batching window.
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Replaces zero values with their defaults.
    pub(crate) fn normalized(mut self) -> Self {
        if self.max_batch_size == 0 {
            self.max_batch_size = DEFAULT_MAX_BATCH_SIZE;
        }
        if self.wait.is_zero() {
            self.wait = DEFAULT_WAIT;
        }
        self
    }
}

/// Output of one batch function call.
///
/// `values[i]` and `errors[i]` correspond to `keys[i]`. For each index an
/// error takes precedence over a value; an index with neither (including
/// indices past the end of both vectors) is reported to its callers as a
/// missing result.
#[derive(Debug)]
pub struct BatchOutput<V> {
    pub values: Vec<Option<V>>,
    pub errors: Vec<Option<BackendError>>,
}

impl<V> BatchOutput<V> {
    pub fn new(values: Vec<Option<V>>, errors: Vec<Option<BackendError>>) -> Self {
        Self { values, errors }
    }

    /// An output carrying no entries at all.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// All keys succeeded, in order.
    pub fn from_values(values: Vec<V>) -> Self {
        Self::new(values.into_iter().map(Some).collect(), Vec::new())
    }

    /// Builds an output from per-key results, in key order.
    pub fn from_results<I, E>(results: I) -> Self
    where
        I: IntoIterator<Item = Result<V, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let (values, errors) = results
            .into_iter()
            .map(|result| match result {
                Ok(value) => (Some(value), None),
                Err(err) => (None, Some(Arc::new(err) as BackendError)),
            })
            .unzip();
        Self { values, errors }
    }

    /// Number of positions covered by either vector.
    pub fn len(&self) -> usize {
        self.values.len().max(self.errors.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes the entry at `index`, error first.
    pub(crate) fn take(&mut self, index: usize) -> Option<Result<V, BackendError>> {
        if let Some(err) = self.errors.get_mut(index).and_then(Option::take) {
            return Some(Err(err));
        }
        self.values.get_mut(index).and_then(Option::take).map(Ok)
    }
}

/// The bulk fetch a loader delegates to.
///
/// Called with the distinct keys of one flushed batch, in enqueue order.
/// The call runs to completion on its own task; no caller's cancellation
/// interrupts it.
#[async_trait]
pub trait BatchFn<K, V>: Send + Sync + 'static
where
    K: Send + Sync + 'static,
    V: Send + 'static,
{
    async fn load(&self, keys: &[K]) -> BatchOutput<V>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn test_default_config_values() {
        let config = LoaderConfig::default();

        assert_eq!(config.max_batch_size, 100);
        assert_eq!(config.wait, Duration::from_millis(16));
    }

    #[test]
    fn test_zero_values_normalize_to_defaults() {
        let config = LoaderConfig::default()
            .with_max_batch_size(0)
            .with_wait(Duration::ZERO)
            .normalized();

        assert_eq!(config, LoaderConfig::default());
    }

    #[test]
    fn test_explicit_values_survive_normalization() {
        let config = LoaderConfig::default()
            .with_max_batch_size(7)
            .with_wait(Duration::from_millis(3))
            .normalized();

        assert_eq!(config.max_batch_size, 7);
        assert_eq!(config.wait, Duration::from_millis(3));
    }

    #[test]
    fn test_error_takes_precedence_over_value() {
        let mut output = BatchOutput::new(
            vec![Some(1u32), Some(2)],
            vec![None, Some(Arc::new(Boom) as BackendError)],
        );

        assert!(matches!(output.take(0), Some(Ok(1))));
        assert!(matches!(output.take(1), Some(Err(_))));
    }

    #[test]
    fn test_short_output_yields_none_past_end() {
        let mut output = BatchOutput::from_values(vec![1u32]);

        assert_eq!(output.len(), 1);
        assert!(output.take(1).is_none());
        assert!(BatchOutput::<u32>::empty().is_empty());
    }

    #[test]
    fn test_from_results_keeps_positions() {
        let mut output = BatchOutput::from_results(vec![Ok("A"), Err(Boom), Ok("C")]);

        assert_eq!(output.len(), 3);
        assert!(matches!(output.take(0), Some(Ok("A"))));
        let err = output.take(1).unwrap().unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(matches!(output.take(2), Some(Ok("C"))));
    }
}
