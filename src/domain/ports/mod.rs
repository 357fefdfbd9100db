//! Domain ports (interfaces) for the Autopilot orchestrator.

pub mod agent_repository;
pub mod critic;
pub mod errors;
pub mod store;
pub mod substrate;
pub mod task_repository;
pub mod tool_runner;

pub use agent_repository::{AgentFilter, AgentRepository};
pub use critic::{Critic, CriticCost, Finding, Report, ReportStatus, Severity};
pub use errors::{StoreError, StoreResult};
pub use store::{AuditFilter, AuditSink, EvidenceStore};
pub use substrate::{
    AgentSubstrate, CompletionRequest, CompletionResponse, Message, MessageRole, StopReason,
};
pub use task_repository::{TaskFilter, TaskRepository};
pub use tool_runner::{CommandOutput, DirEntry, ToolRunner, VcsStatus};
