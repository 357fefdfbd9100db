//! Infrastructure layer
//!
//! Ambient concerns that support every component but encode no orchestrator
//! semantics themselves:
//! - Configuration loading (`figment`-based hierarchical merge)
//! - Structured logging, rotation, and secret scrubbing (`tracing`)
//!
//! Persistence and the LLM provider live under `adapters` — they implement
//! domain ports and belong with the rest of the hexagon's adapters, not here.

pub mod config;
pub mod logging;
