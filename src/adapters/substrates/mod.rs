//! Substrate adapter implementations.

pub mod anthropic;
pub mod mock;

pub use anthropic::{AnthropicConfig, AnthropicSubstrate};
pub use mock::{MockResponse, MockSubstrate};
