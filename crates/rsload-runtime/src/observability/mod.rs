//! Observability setup for rsload hosts.
//!
//! This module provides:
//! - Structured logging configuration
//! - Loader metric registration

mod logging;

pub use logging::{init_logging, LoggingConfig};

use crate::config::{ConfigLoadError, RuntimeConfig};

/// Initializes logging and, if enabled, registers loader metric
/// descriptions with the installed recorder.
pub fn init_observability(config: &RuntimeConfig) -> Result<(), ConfigLoadError> {
    if !init_logging(&LoggingConfig::from_settings(&config.logging)?) {
        tracing::debug!("global subscriber already installed, keeping it");
    }

    if config.metrics.enabled {
        rsload_domain::register_loader_metrics();
    }

    tracing::info!(
        max_batch_size = config.loader.max_batch_size,
        wait_ms = config.loader.wait_ms,
        metrics = config.metrics.enabled,
        "observability initialized"
    );
    Ok(())
}
