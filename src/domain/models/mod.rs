//! Domain models
//!
//! Pure domain entities with business logic and validation rules.
//! These models are framework-agnostic and contain no infrastructure concerns.

pub mod agent;
pub mod audit;
pub mod bypass_pattern;
pub mod config;
pub mod evidence;
pub mod model_selection;
pub mod phase;
pub mod quality_graph;
pub mod roadmap;
pub mod task;
pub mod wip;

pub use agent::{Agent, AgentStatus, AgentTier, UsageSample};
pub use audit::{Actor, AuditEvent, AuditEventKind};
pub use bypass_pattern::{BypassDetector, BypassPattern, BypassSignal};
pub use config::Config;
pub use evidence::{EvidenceArtifact, EvidenceBundle};
pub use model_selection::ModelSelection;
pub use phase::Phase;
pub use quality_graph::{cosine_similarity, Dimension, HistoricalPatternStore, QualityGraphNode, MAX_HISTORICAL_PATTERNS};
pub use roadmap::Roadmap;
pub use task::{
    Blocker, ComplexityFactors, ComplexityTier, PhaseAttempts, Task, TaskStatus, TaskType,
};
pub use wip::{WipSlot, WipStatus};
