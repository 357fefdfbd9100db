//! In-memory substrate for tests and for `autopilot validate`/`autopilot
//! gate`, which must never call a live provider (spec §6).

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::errors::AutopilotError;
use crate::domain::ports::{AgentSubstrate, CompletionRequest, CompletionResponse, StopReason};

/// A canned response, optionally keyed to a substring of the request's
/// first user message so a test can script different outputs per call.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub content: String,
    pub fail: bool,
    pub failure_message: String,
    pub retry_after_s: Option<u32>,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            content: "mock completion".to_string(),
            fail: false,
            failure_message: String::new(),
            retry_after_s: None,
            input_tokens: 100,
            output_tokens: 50,
        }
    }
}

impl MockResponse {
    pub fn success(content: impl Into<String>) -> Self {
        Self { content: content.into(), ..Default::default() }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { fail: true, failure_message: message.into(), ..Default::default() }
    }

    pub fn rate_limited(message: impl Into<String>, retry_after_s: u32) -> Self {
        Self {
            fail: true,
            failure_message: message.into(),
            retry_after_s: Some(retry_after_s),
            ..Default::default()
        }
    }
}

/// Matches the teacher's `MockSubstrate`: a default response plus overrides
/// keyed by a substring match against the prompt, so scenario tests can
/// script per-phase outcomes without a live provider.
pub struct MockSubstrate {
    default_response: MockResponse,
    overrides: RwLock<HashMap<String, MockResponse>>,
}

impl MockSubstrate {
    pub fn new() -> Self {
        Self {
            default_response: MockResponse::default(),
            overrides: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_default_response(response: MockResponse) -> Self {
        Self { default_response: response, overrides: RwLock::new(HashMap::new()) }
    }

    /// Subsequent calls whose last user message contains `matching` return
    /// `response` instead of the default.
    pub async fn script(&self, matching: impl Into<String>, response: MockResponse) {
        self.overrides.write().await.insert(matching.into(), response);
    }

    async fn response_for(&self, request: &CompletionRequest) -> MockResponse {
        let last_user = request.messages.iter().rev().map(|m| m.content.as_str()).next().unwrap_or("");
        let overrides = self.overrides.read().await;
        for (key, response) in overrides.iter() {
            if last_user.contains(key.as_str()) {
                return response.clone();
            }
        }
        self.default_response.clone()
    }
}

impl Default for MockSubstrate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentSubstrate for MockSubstrate {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AutopilotError> {
        let response = self.response_for(&request).await;

        if response.fail {
            return Err(AutopilotError::Transient {
                message: response.failure_message,
                retry_after_s: response.retry_after_s,
            });
        }

        Ok(CompletionResponse {
            content: response.content,
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
            stop_reason: StopReason::EndTurn,
        })
    }

    fn estimate_cost_usd(&self, _model: &str, _input_tokens: u32, _output_tokens: u32) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::Message;

    fn request(prompt: &str) -> CompletionRequest {
        CompletionRequest {
            model: "mock-model".to_string(),
            system_prompt: None,
            messages: vec![Message::user(prompt)],
            max_tokens: 1024,
        }
    }

    #[tokio::test]
    async fn default_response_succeeds() {
        let substrate = MockSubstrate::new();
        let response = substrate.complete(request("hello")).await.unwrap();
        assert_eq!(response.content, "mock completion");
    }

    #[tokio::test]
    async fn failure_response_is_transient() {
        let substrate = MockSubstrate::with_default_response(MockResponse::failure("out of budget"));
        let err = substrate.complete(request("hello")).await.unwrap_err();
        assert!(err.is_retry_exempt());
    }

    #[tokio::test]
    async fn scripted_response_overrides_default() {
        let substrate = MockSubstrate::new();
        substrate.script("spec phase", MockResponse::success("spec output")).await;

        let response = substrate.complete(request("run the spec phase now")).await.unwrap();
        assert_eq!(response.content, "spec output");

        let unscripted = substrate.complete(request("run the implement phase")).await.unwrap();
        assert_eq!(unscripted.content, "mock completion");
    }

    #[tokio::test]
    async fn rate_limited_response_carries_retry_after() {
        let substrate = MockSubstrate::with_default_response(MockResponse::rate_limited("slow down", 30));
        let err = substrate.complete(request("hello")).await.unwrap_err();
        assert_eq!(err.retry_after_s(), Some(30));
    }

    #[test]
    fn estimate_cost_is_zero() {
        let substrate = MockSubstrate::new();
        assert_eq!(substrate.estimate_cost_usd("mock-model", 100, 100), 0.0);
    }
}
