//! Model Selection record — the Model Router's (C3) durable decision trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent::AgentTier;
use super::task::ComplexityTier;

/// Why a particular model was chosen, for the audit trail and for
/// `autopilot status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSelection {
    pub task_id: Uuid,
    pub agent_tier: AgentTier,
    pub complexity_score: u8,
    pub complexity_tier: ComplexityTier,
    pub model: String,
    pub retry_attempt: u32,
    /// True when the tier was bumped past what the raw complexity score
    /// would select, either by retry escalation or by
    /// `architect_always_complex`.
    pub escalated: bool,
    pub candidates_considered: u32,
    pub cost_usd_estimate: f64,
    pub decided_at: DateTime<Utc>,
}

impl ModelSelection {
    pub fn as_audit_context(&self) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "complexity_score": self.complexity_score,
            "complexity_tier": self.complexity_tier,
            "escalated": self.escalated,
            "retry_attempt": self.retry_attempt,
        })
    }
}
