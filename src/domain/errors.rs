//! The `AutopilotError` taxonomy (spec §7), realized as a single enum so
//! every layer — phase machine, critics, the CLI — reports failures through
//! one vocabulary.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AutopilotError {
    /// A provider/network/subprocess failure expected to succeed on retry.
    /// Exempt from the phase retry ceiling (spec §4.6). `retry_after_s`
    /// carries the provider's own `Retry-After` value when one was sent, so
    /// the Agent Pool's cooldown is never shorter than what the provider
    /// actually asked for.
    #[error("transient failure: {message}")]
    Transient {
        message: String,
        retry_after_s: Option<u32>,
    },

    /// The agent's context window was exhausted mid-phase.
    #[error("context window overflow on task {task_id} during {phase}")]
    ContextOverflow { task_id: Uuid, phase: String },

    /// A critic reported a blocking failure.
    #[error("critic '{critic}' failed: {message}")]
    CriticFailure { critic: String, message: String },

    /// The Tool Runner's subprocess exited non-zero or was killed.
    #[error("process failure (exit {exit_code:?}): {message}")]
    ProcessFailure { exit_code: Option<i32>, message: String },

    /// Persisted state violates an invariant the orchestrator relies on
    /// (corrupt evidence hash, dependency cycle, duplicate pid lock).
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// A safety limit (memory, disk, spend rate) was breached.
    #[error("safety breach: {0}")]
    SafetyBreach(String),

    /// The operation was cancelled by shutdown signal or operator command.
    #[error("cancelled")]
    Cancelled,

    #[error("task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("agent not found: {0}")]
    AgentNotFound(Uuid),

    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("task dependency cycle detected involving task: {0}")]
    DependencyCycle(Uuid),

    #[error("no eligible model for complexity tier {tier}")]
    NoEligibleModel { tier: String },

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("store error: {0}")]
    Store(#[from] crate::domain::ports::StoreError),
}

pub type AutopilotResult<T> = Result<T, AutopilotError>;

impl AutopilotError {
    /// Whether this error should be retried without counting against a
    /// phase's attempt ceiling (spec §4.6).
    pub fn is_retry_exempt(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Provider-supplied retry-after, when this is a `Transient` error that
    /// carried one.
    pub fn retry_after_s(&self) -> Option<u32> {
        match self {
            Self::Transient { retry_after_s, .. } => *retry_after_s,
            _ => None,
        }
    }

    pub fn is_safety_breach(&self) -> bool {
        matches!(self, Self::SafetyBreach(_))
    }
}

impl From<sqlx::Error> for AutopilotError {
    fn from(err: sqlx::Error) -> Self {
        AutopilotError::Store(crate::domain::ports::StoreError::QueryFailed(err))
    }
}

impl From<reqwest::Error> for AutopilotError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            AutopilotError::Transient { message: err.to_string(), retry_after_s: None }
        } else {
            AutopilotError::ProcessFailure {
                exit_code: None,
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for AutopilotError {
    fn from(err: serde_json::Error) -> Self {
        AutopilotError::Integrity(format!("serialization: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_is_retry_exempt() {
        let transient = AutopilotError::Transient { message: "timeout".into(), retry_after_s: None };
        assert!(transient.is_retry_exempt());
        assert!(!AutopilotError::Cancelled.is_retry_exempt());
        assert!(!AutopilotError::Integrity("bad hash".into()).is_retry_exempt());
    }

    #[test]
    fn retry_after_s_passes_through_provider_value() {
        let transient = AutopilotError::Transient { message: "rate limited".into(), retry_after_s: Some(45) };
        assert_eq!(transient.retry_after_s(), Some(45));
        assert_eq!(AutopilotError::Cancelled.retry_after_s(), None);
    }
}
