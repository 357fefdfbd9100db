//! Anthropic Messages API substrate — the production `AgentSubstrate`.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use governor::state::{InMemoryState, NotKeyed};
use governor::clock::DefaultClock;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::domain::errors::AutopilotError;
use crate::domain::models::config::AnthropicSubstrateConfig;
use crate::domain::ports::{
    AgentSubstrate, CompletionRequest, CompletionResponse, Message, MessageRole, StopReason,
};
use crate::services::cost_tracker::estimate_cost;

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
    pub api_version: String,
    pub timeout_secs: u64,
    /// Requests per second the Agent Pool is allowed to issue against this
    /// substrate, independent of per-agent cooldowns (spec §4.4).
    pub requests_per_second: u32,
}

impl AnthropicConfig {
    /// Builds from `Config::substrates.anthropic`, falling back to
    /// `ANTHROPIC_API_KEY` when the settings carry no key (spec §6). Returns
    /// `ConfigError`-shaped `AutopilotError::Configuration` when neither is set.
    pub fn from_settings(settings: &AnthropicSubstrateConfig) -> Result<Self, AutopilotError> {
        let api_key = settings
            .api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or_else(|| AutopilotError::Configuration("ANTHROPIC_API_KEY not set".into()))?;

        Ok(Self {
            api_key,
            base_url: settings.base_url.clone().unwrap_or_else(|| "https://api.anthropic.com".to_string()),
            api_version: "2023-06-01".to_string(),
            timeout_secs: settings.request_timeout_secs,
            requests_per_second: settings.rate_limit_rps.max(1.0).round() as u32,
        })
    }
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Usage,
}

/// Calls the Anthropic Messages API directly over HTTPS. Rate-limited
/// client-side with `governor` ahead of the provider's own 429s, and every
/// call is wrapped in `backoff`'s exponential retry for transient failures
/// (spec §4.4, §4.9 — these supersede a hand-rolled limiter/retry loop).
pub struct AnthropicSubstrate {
    config: AnthropicConfig,
    client: reqwest::Client,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl AnthropicSubstrate {
    pub fn new(config: AnthropicConfig) -> Result<Self, AutopilotError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        let rps = NonZeroU32::new(config.requests_per_second.max(1)).expect("non-zero by construction");
        let limiter = Arc::new(RateLimiter::direct(Quota::per_second(rps)));

        Ok(Self { config, client, limiter })
    }

    fn to_api_request(request: &CompletionRequest) -> MessagesRequest {
        let messages = request
            .messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                    MessageRole::System => "user",
                },
                content: m.content.clone(),
            })
            .collect();

        MessagesRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            system: request.system_prompt.clone(),
            messages,
        }
    }

    async fn call_once(&self, request: &CompletionRequest) -> Result<CompletionResponse, AutopilotError> {
        self.limiter.until_ready().await;

        let body = Self::to_api_request(request);
        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("content-type", "application/json")
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            let retry_after_s = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u32>().ok());
            let text = response.text().await.unwrap_or_default();
            return Err(AutopilotError::Transient {
                message: format!("anthropic api {status}: {text}"),
                retry_after_s,
            });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AutopilotError::ProcessFailure {
                exit_code: Some(status.as_u16() as i32),
                message: text,
            });
        }

        let parsed: MessagesResponse = response.json().await?;
        let content = parsed.content.iter().map(|b| b.text.as_str()).collect::<Vec<_>>().join("\n");

        let stop_reason = match parsed.stop_reason.as_deref() {
            Some("max_tokens") => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        };

        Ok(CompletionResponse {
            content,
            input_tokens: parsed.usage.input_tokens,
            output_tokens: parsed.usage.output_tokens,
            stop_reason,
        })
    }
}

#[async_trait]
impl AgentSubstrate for AnthropicSubstrate {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AutopilotError> {
        let backoff = backoff::ExponentialBackoffBuilder::new()
            .with_initial_interval(std::time::Duration::from_secs(1))
            .with_max_interval(std::time::Duration::from_secs(16))
            .with_max_elapsed_time(Some(std::time::Duration::from_secs(60)))
            .build();

        backoff::future::retry(backoff, || async {
            self.call_once(&request).await.map_err(|e| {
                if e.is_retry_exempt() {
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        })
        .await
    }

    fn estimate_cost_usd(&self, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
        estimate_cost(model, input_tokens as u64, output_tokens as u64, 0, 0).unwrap_or(0.0)
    }
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}
