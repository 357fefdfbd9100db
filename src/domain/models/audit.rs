//! Audit Event — the durable, append-only record of everything the
//! orchestrator decided (spec §3, §4.1, §9).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who or what produced an audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum Actor {
    Supervisor,
    Scheduler,
    ModelRouter,
    AgentPool,
    Critic(String),
    QualityGate,
    Operations,
    /// An operator-invoked CLI command.
    Cli(String),
}

/// Category of event, used to filter `autopilot status --audit` queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    PhaseTransition,
    ModelRouted,
    ModelEscalated,
    AgentClaimed,
    AgentReleased,
    AgentCooldown,
    CriticReport,
    QualityGateDecision,
    RemediationCreated,
    BypassDetected,
    WipReserved,
    WipReleased,
    SafetyBreach,
    ProfileUpdated,
    MaintenanceSignal,
    Startup,
    Shutdown,
}

/// One append-only record in `analytics/audit.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub kind: AuditEventKind,
    pub actor: Actor,
    pub task_id: Option<Uuid>,
    pub message: String,
    /// Free-form structured context (e.g. the full `ModelSelection`, the
    /// `Report` from a critic). Kept as `serde_json::Value` so the audit
    /// schema doesn't have to grow a new Rust type for every event kind.
    pub context: serde_json::Value,
}

impl AuditEvent {
    pub fn new(kind: AuditEventKind, actor: Actor, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            at: Utc::now(),
            kind,
            actor,
            task_id: None,
            message: message.into(),
            context: serde_json::Value::Null,
        }
    }

    pub fn for_task(mut self, task_id: Uuid) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    /// Serialize as a single JSONL line, including the trailing newline.
    pub fn to_jsonl_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
