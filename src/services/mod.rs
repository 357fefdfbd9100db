//! Application services for the Autopilot orchestrator.
//!
//! Each module here implements one lettered component from the system
//! overview (C1 persistence lives in `adapters`/`domain::ports`; C2-C10
//! live here).

pub mod agent_pool;
pub mod cost_tracker;
pub mod critics;
pub mod dependency_resolver;
pub mod model_router;
pub mod operations;
pub mod phase_machine;
pub mod priority_calculator;
pub mod quality_gate;
pub mod scheduler;
pub mod wip;

pub use agent_pool::AgentPool;
pub use cost_tracker::{estimate_cost, get_model_pricing, CostSummary, ModelPricing};
pub use dependency_resolver::DependencyResolver;
pub use model_router::ModelRouter;
pub use operations::{ExecutionOutcome, MaintenanceSignal, OperationsManager, OperationsMode};
pub use phase_machine::{Advance, PhaseMachine, PhaseMachineConfig};
pub use priority_calculator::PriorityCalculator;
pub use quality_gate::{GateDecision, QualityGate, QualityGateConfig, QualityThresholds};
pub use scheduler::Scheduler;
pub use wip::WipController;
