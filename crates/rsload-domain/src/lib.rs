//! rsload-domain: Batching, deduplicating, caching key loader
//!
//! This crate contains the loader core:
//! - Result cache with explicit invalidation and priming
//! - Waiters that fan one outcome out to every interested caller
//! - Batch collection, flush scheduling and execution
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                rsload-domain                 │
//! ├─────────────────────────────────────────────┤
//! │  cache/   - ResultCache trait, MemoryCache   │
//! │  loader/  - DataLoader and batch lifecycle   │
//! │  error.rs - Per-key loader errors            │
//! └─────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod loader;

// Re-export commonly used types at the crate root
pub use cache::{MemoryCache, ResultCache};
pub use error::{BackendError, LoaderError, LoaderResult};
pub use loader::{register_loader_metrics, BatchFn, BatchOutput, DataLoader, LoaderConfig};
