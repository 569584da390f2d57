//! rsload-runtime: Configuration and assembly for rsload loaders
//!
//! This crate contains what a host process needs around the loader core:
//! - Layered configuration (defaults, YAML file, environment)
//! - Structured logging and metric registration
//! - A builder that turns configuration into a `DataLoader`
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               rsload-runtime                 │
//! ├─────────────────────────────────────────────┤
//! │  config.rs      - Configuration management  │
//! │  observability/ - Logging and metrics        │
//! │  builder.rs     - Loader assembly            │
//! └─────────────────────────────────────────────┘
//! ```

pub mod builder;
pub mod config;
pub mod observability;

// Re-exports for convenience
pub use builder::LoaderBuilder;
pub use config::{ConfigLoadError, RuntimeConfig};
pub use observability::init_observability;
