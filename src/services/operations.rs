//! Operations Manager (C9) — aggregates throughput/quality signals, tunes
//! the Scheduler's priority profile, and raises maintenance signals
//! (spec §4.9).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::errors::AutopilotError;
use crate::domain::models::{AuditEvent, AuditEventKind, Actor, Task, TaskStatus};
use crate::domain::ports::AuditSink;
use crate::domain::ports::TaskRepository;
use crate::services::cost_tracker::CostSummary;
use crate::services::priority_calculator::PriorityCalculator;
use crate::services::scheduler::Scheduler;

/// Default rolling window of execution outcomes (spec §4.9).
pub const DEFAULT_WINDOW: usize = 50;

/// Minimum interval between repeated maintenance signals of the same kind.
const MAINTENANCE_SIGNAL_COOLDOWN: chrono::Duration = chrono::Duration::minutes(5);

/// One completed phase execution, as reported by the Supervisor after a
/// Quality Gate verdict.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub recorded_at: DateTime<Utc>,
    pub quality_score: f32,
    pub success: bool,
    pub duration_ms: u64,
    pub rate_limited: bool,
}

/// Scheduling posture the Operations Manager selects per heuristic
/// (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationsMode {
    Balance,
    Stabilize,
    Accelerate,
}

impl OperationsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Balance => "balance",
            Self::Stabilize => "stabilize",
            Self::Accelerate => "accelerate",
        }
    }

    /// Priority weights this mode installs on the Scheduler (spec §4.7's
    /// `complexity_bias`/`staleness_bias`, shifted per mode).
    fn priority_profile(&self) -> PriorityCalculator {
        match self {
            Self::Balance => PriorityCalculator::new(),
            // Drain the backlog of stuck/ageing work before starting new
            // complex tasks.
            Self::Stabilize => PriorityCalculator::with_weights(0.1, 0.3),
            // Push high-complexity, high-value work forward aggressively.
            Self::Accelerate => PriorityCalculator::with_weights(0.5, 0.05),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum MaintenanceSignal {
    BlockedTasks,
    Underutilised,
}

impl MaintenanceSignal {
    fn as_str(&self) -> &'static str {
        match self {
            Self::BlockedTasks => "blocked_tasks",
            Self::Underutilised => "underutilised",
        }
    }
}

pub struct OperationsManager<T: TaskRepository + 'static> {
    window: RwLock<VecDeque<ExecutionOutcome>>,
    window_size: usize,
    scheduler: Arc<Scheduler<T>>,
    audit: Arc<dyn AuditSink>,
    cost_summary: RwLock<CostSummary>,
    last_signal_at: RwLock<HashMap<&'static str, DateTime<Utc>>>,
    target_usage_ratio: f64,
    current_mode: RwLock<OperationsMode>,
}

impl<T: TaskRepository + 'static> OperationsManager<T> {
    pub fn new(scheduler: Arc<Scheduler<T>>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            window: RwLock::new(VecDeque::with_capacity(DEFAULT_WINDOW)),
            window_size: DEFAULT_WINDOW,
            scheduler,
            audit,
            cost_summary: RwLock::new(CostSummary::default()),
            last_signal_at: RwLock::new(HashMap::new()),
            target_usage_ratio: 0.7,
            current_mode: RwLock::new(OperationsMode::Balance),
        }
    }

    pub fn with_window_size(mut self, size: usize) -> Self {
        self.window_size = size;
        self
    }

    pub fn with_target_usage_ratio(mut self, ratio: f64) -> Self {
        self.target_usage_ratio = ratio;
        self
    }

    async fn avg_quality(&self) -> f32 {
        let window = self.window.read().await;
        if window.is_empty() {
            return 1.0;
        }
        window.iter().map(|o| o.quality_score).sum::<f32>() / window.len() as f32
    }

    async fn failure_rate(&self) -> f64 {
        let window = self.window.read().await;
        if window.is_empty() {
            return 0.0;
        }
        let failures = window.iter().filter(|o| !o.success).count();
        failures as f64 / window.len() as f64
    }

    async fn recent_rate_limit_events(&self) -> usize {
        self.window.read().await.iter().filter(|o| o.rate_limited).count()
    }

    async fn compute_mode(&self, usage_ratio: f64) -> OperationsMode {
        let avg_quality = self.avg_quality().await;
        let failure_rate = self.failure_rate().await;
        let rate_limit_events = self.recent_rate_limit_events().await;

        if avg_quality < 0.85 || failure_rate > 0.2 || rate_limit_events > 3 {
            OperationsMode::Stabilize
        } else if avg_quality >= 0.9 && failure_rate < 0.1 && usage_ratio >= self.target_usage_ratio {
            OperationsMode::Accelerate
        } else {
            OperationsMode::Balance
        }
    }

    /// Record one completed phase execution, recompute the mode, and push
    /// an updated priority profile to the Scheduler if it changed
    /// (spec §4.9).
    pub async fn record_outcome(
        &self,
        outcome: ExecutionOutcome,
        usage_ratio: f64,
    ) -> Result<OperationsMode, AutopilotError> {
        {
            let mut window = self.window.write().await;
            window.push_back(outcome);
            while window.len() > self.window_size {
                window.pop_front();
            }
        }

        let mode = self.compute_mode(usage_ratio).await;
        let previous = {
            let mut current = self.current_mode.write().await;
            let previous = *current;
            *current = mode;
            previous
        };

        if previous != mode {
            self.scheduler.set_priority_profile(mode.priority_profile()).await;
            self.audit
                .append_audit(&AuditEvent::new(
                    AuditEventKind::ProfileUpdated,
                    Actor::Operations,
                    format!("profile:updated mode={}", mode.as_str()),
                ))
                .await?;
        }

        Ok(mode)
    }

    pub async fn current_mode(&self) -> OperationsMode {
        *self.current_mode.read().await
    }

    /// Evaluate `blocked_tasks`/`underutilised` maintenance conditions
    /// against the current roadmap, rate-limited to one emission per
    /// signal per `MAINTENANCE_SIGNAL_COOLDOWN` (spec §4.9).
    pub async fn check_maintenance_signals(
        &self,
        tasks: &[Task],
        queue_length: usize,
        available_agents: usize,
    ) -> Result<Vec<MaintenanceSignal>, AutopilotError> {
        let mut raised = Vec::new();

        if !tasks.is_empty() {
            let blocked = tasks.iter().filter(|t| t.status == TaskStatus::Blocked).count();
            if blocked as f64 / tasks.len() as f64 > 0.2 {
                raised.push(MaintenanceSignal::BlockedTasks);
            }
        }

        if queue_length < available_agents {
            raised.push(MaintenanceSignal::Underutilised);
        }

        let mut emitted = Vec::new();
        let now = Utc::now();
        let mut last_signal_at = self.last_signal_at.write().await;
        for signal in raised {
            let key = signal.as_str();
            let should_emit = match last_signal_at.get(key) {
                Some(last) => now - *last >= MAINTENANCE_SIGNAL_COOLDOWN,
                None => true,
            };
            if should_emit {
                last_signal_at.insert(key, now);
                self.audit
                    .append_audit(&AuditEvent::new(
                        AuditEventKind::MaintenanceSignal,
                        Actor::Operations,
                        key.to_string(),
                    ))
                    .await?;
                emitted.push(signal);
            }
        }
        Ok(emitted)
    }

    /// Record one model call's token usage for the rolling cost summary.
    /// Observability only — never gates execution (spec §4.9).
    pub async fn record_cost_sample(&self, model: &str, input_tokens: u64, output_tokens: u64) {
        self.cost_summary.write().await.add_sample(model, input_tokens, output_tokens);
    }

    pub async fn cost_summary(&self) -> CostSummary {
        self.cost_summary.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::errors::StoreResult;
    use crate::domain::ports::store::AuditFilter;
    use crate::domain::ports::task_repository::TaskFilter;
    use crate::services::wip::WipController;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct InMemoryTaskRepo {
        rows: Mutex<HashMap<Uuid, Task>>,
    }

    #[async_trait]
    impl TaskRepository for InMemoryTaskRepo {
        async fn create(&self, task: &Task) -> StoreResult<()> {
            self.rows.lock().unwrap().insert(task.id, task.clone());
            Ok(())
        }
        async fn get(&self, id: Uuid) -> StoreResult<Option<Task>> {
            Ok(self.rows.lock().unwrap().get(&id).cloned())
        }
        async fn update(&self, task: &Task) -> StoreResult<()> {
            self.rows.lock().unwrap().insert(task.id, task.clone());
            Ok(())
        }
        async fn delete(&self, id: Uuid) -> StoreResult<()> {
            self.rows.lock().unwrap().remove(&id);
            Ok(())
        }
        async fn list(&self, _filter: TaskFilter) -> StoreResult<Vec<Task>> {
            Ok(self.rows.lock().unwrap().values().cloned().collect())
        }
        async fn load_roadmap(&self) -> StoreResult<Vec<Task>> {
            Ok(self.rows.lock().unwrap().values().cloned().collect())
        }
        async fn list_by_status(&self, status: TaskStatus) -> StoreResult<Vec<Task>> {
            Ok(self.rows.lock().unwrap().values().filter(|t| t.status == status).cloned().collect())
        }
        async fn get_dependents(&self, _task_id: Uuid) -> StoreResult<Vec<Task>> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct InMemoryAuditSink {
        events: Mutex<Vec<AuditEvent>>,
    }

    #[async_trait]
    impl AuditSink for InMemoryAuditSink {
        async fn append_audit(&self, event: &AuditEvent) -> StoreResult<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
        async fn query_audit(&self, _filter: AuditFilter) -> StoreResult<Vec<AuditEvent>> {
            Ok(self.events.lock().unwrap().clone())
        }
    }

    fn outcome(quality: f32, success: bool, rate_limited: bool) -> ExecutionOutcome {
        ExecutionOutcome {
            recorded_at: Utc::now(),
            quality_score: quality,
            success,
            duration_ms: 1000,
            rate_limited,
        }
    }

    fn manager() -> OperationsManager<InMemoryTaskRepo> {
        let scheduler = Arc::new(Scheduler::new(
            Arc::new(InMemoryTaskRepo::default()),
            Arc::new(WipController::new(4, 1)),
        ));
        OperationsManager::new(scheduler, Arc::new(InMemoryAuditSink::default()))
    }

    #[tokio::test]
    async fn low_quality_triggers_stabilize() {
        let mgr = manager();
        let mode = mgr.record_outcome(outcome(0.5, true, false), 0.5).await.unwrap();
        assert_eq!(mode, OperationsMode::Stabilize);
    }

    #[tokio::test]
    async fn high_quality_and_usage_triggers_accelerate() {
        let mgr = manager();
        let mut mode = OperationsMode::Balance;
        for _ in 0..5 {
            mode = mgr.record_outcome(outcome(0.95, true, false), 0.9).await.unwrap();
        }
        assert_eq!(mode, OperationsMode::Accelerate);
    }

    #[tokio::test]
    async fn frequent_rate_limits_trigger_stabilize() {
        let mgr = manager();
        let mut mode = OperationsMode::Balance;
        for _ in 0..4 {
            mode = mgr.record_outcome(outcome(0.95, true, true), 0.9).await.unwrap();
        }
        assert_eq!(mode, OperationsMode::Stabilize);
    }

    #[tokio::test]
    async fn window_truncates_to_configured_size() {
        let mgr = manager().with_window_size(3);
        for _ in 0..10 {
            mgr.record_outcome(outcome(1.0, true, false), 0.5).await.unwrap();
        }
        assert_eq!(mgr.window.read().await.len(), 3);
    }

    #[tokio::test]
    async fn blocked_tasks_signal_rate_limited_to_once() {
        let mgr = manager();
        let mut tasks = Vec::new();
        for _ in 0..10 {
            let mut t = Task::new("T", "d");
            t.status = TaskStatus::Blocked;
            tasks.push(t);
        }
        let first = mgr.check_maintenance_signals(&tasks, 10, 1).await.unwrap();
        assert_eq!(first.len(), 1);
        let second = mgr.check_maintenance_signals(&tasks, 10, 1).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn underutilised_signal_fires_when_queue_below_capacity() {
        let mgr = manager();
        let tasks = vec![Task::new("T", "d")];
        let signals = mgr.check_maintenance_signals(&tasks, 1, 5).await.unwrap();
        assert!(matches!(signals.as_slice(), [MaintenanceSignal::Underutilised]));
    }

    #[tokio::test]
    async fn cost_samples_accumulate() {
        let mgr = manager();
        mgr.record_cost_sample("opus", 1000, 500).await;
        mgr.record_cost_sample("haiku", 2000, 1000).await;
        let summary = mgr.cost_summary().await;
        assert_eq!(summary.sample_count, 2);
    }
}
