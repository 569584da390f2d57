//! Assembly of data loaders from runtime configuration.

use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use rsload_domain::{BatchFn, DataLoader, LoaderConfig, ResultCache};

use crate::config::LoaderSettings;

/// Builds [`DataLoader`]s from configuration.
///
/// # Example
///
/// ```ignore
/// let config = RuntimeConfig::load("rsload.yaml")?;
/// let loader = LoaderBuilder::from_settings(&config.loader).build(UserFetcher::new(pool));
/// ```
pub struct LoaderBuilder<K, V> {
    config: LoaderConfig,
    cache: Option<Arc<dyn ResultCache<K, V>>>,
}

impl<K, V> Default for LoaderBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> LoaderBuilder<K, V> {
    /// A builder with default batching and a loader-owned cache.
    pub fn new() -> Self {
        Self {
            config: LoaderConfig::default(),
            cache: None,
        }
    }

    pub fn from_settings(settings: &LoaderSettings) -> Self {
        Self {
            config: settings.to_loader_config(),
            cache: None,
        }
    }

    pub fn max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.config = self.config.with_max_batch_size(max_batch_size);
        self
    }

    pub fn wait(mut self, wait: Duration) -> Self {
        self.config = self.config.with_wait(wait);
        self
    }

    /// Shares an externally owned cache with the loader.
    pub fn cache(mut self, cache: Arc<dyn ResultCache<K, V>>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }
}

impl<K, V> LoaderBuilder<K, V>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn build<F>(self, fetcher: F) -> DataLoader<K, V, F>
    where
        F: BatchFn<K, V>,
    {
        tracing::debug!(
            max_batch_size = self.config.max_batch_size,
            wait_ms = self.config.wait.as_millis() as u64,
            shared_cache = self.cache.is_some(),
            "building data loader"
        );
        match self.cache {
            Some(cache) => DataLoader::with_cache(fetcher, self.config, cache),
            None => DataLoader::new(fetcher, self.config),
        }
    }
}
