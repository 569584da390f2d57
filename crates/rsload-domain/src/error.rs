//! Loader error types.

use std::sync::Arc;

use thiserror::Error;

/// A backend failure reported by a batch function for one key.
///
/// Shared so the same failure can be delivered to every caller waiting
/// on that key.
pub type BackendError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned to callers of the loader.
///
/// Every variant is local to the key (and caller) it was delivered to;
/// none of them affect other keys in the same batch.
#[derive(Debug, Clone, Error)]
pub enum LoaderError {
    /// The batch function reported an error for this key.
    #[error("backend error: {0}")]
    Backend(BackendError),

    /// The batch function returned fewer entries than keys requested.
    #[error("no result returned for key {key}")]
    MissingResult { key: String },

    /// The caller's cancellation fired while it was waiting.
    #[error("load cancelled by caller")]
    Cancelled,

    /// The task executing the batch ended without delivering an outcome.
    #[error("batch for key {key} was abandoned before completion")]
    BatchAbandoned { key: String },

    /// A cache miss was polled outside a Tokio runtime, so no batch could
    /// be scheduled. The key was not enqueued.
    #[error("no Tokio runtime available to schedule a batch for key {key}")]
    NoRuntime { key: String },
}

impl LoaderError {
    /// Wraps any error as a backend error.
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        LoaderError::Backend(Arc::new(err))
    }

    /// Returns true if this caller gave up waiting.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoaderError::Cancelled)
    }

    /// Returns the underlying backend error, if any.
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            LoaderError::Backend(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for loader operations.
pub type LoaderResult<T> = Result<T, LoaderError>;
