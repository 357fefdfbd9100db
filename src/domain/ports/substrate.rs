//! LLM provider contract consumed by the Agent Pool (C4).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::AutopilotError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    ContextOverflow,
}

/// A chat-completion provider backing the Agent Pool. `AnthropicSubstrate`
/// is the production adapter; `MockSubstrate` drives tests and
/// `autopilot validate`/`autopilot gate` (spec §6, which never call a live
/// provider).
#[async_trait]
pub trait AgentSubstrate: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AutopilotError>;

    /// Estimated USD cost for a completion of this shape, used by the Model
    /// Router's candidate ranking (spec §4.3 step 3) without making a call.
    fn estimate_cost_usd(&self, model: &str, input_tokens: u32, output_tokens: u32) -> f64;
}
