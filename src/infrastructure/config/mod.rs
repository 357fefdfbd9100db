//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading
//! - Environment variable overrides
//! - CLI flag overrides (applied last, highest priority)
//! - Configuration validation

pub mod loader;

pub use loader::{CliOverrides, ConfigError, ConfigLoader};
