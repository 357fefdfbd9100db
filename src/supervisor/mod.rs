//! Supervisor (C10) — the process that owns the worker pool, wires every
//! other component together, and answers for the exit codes `autopilot run`
//! reports (spec §6, §9).
//!
//! Grounded on the teacher's `SwarmOrchestrator`: a struct of `Arc`-wrapped
//! subsystems, generic over the repository type parameter, shut down via a
//! broadcast channel rather than a supervisor tree.

pub mod heartbeat;
pub mod pid_lock;
pub mod safety;
pub mod worker;

pub use heartbeat::HeartbeatWriter;
pub use pid_lock::PidLock;
pub use safety::{ResourceProbe, SafetyMonitor, SystemResourceProbe};
pub use worker::{PhaseResult, PhaseWorker};

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{info, warn};

use crate::domain::errors::AutopilotError;
use crate::domain::models::agent::{AgentTier, UsageSample};
use crate::domain::models::config::Config;
use crate::domain::models::{Actor, AuditEvent, AuditEventKind, Task, TaskStatus, TaskType};
use crate::domain::ports::{AgentRepository, AgentSubstrate, AuditSink, EvidenceStore, TaskRepository, ToolRunner};
use crate::services::agent_pool::AgentPool;
use crate::services::critics::{
    BuildCritic, LintCritic, ProcessCritic, ReasoningCritic, SecurityScanCritic, StructuralCritic, TestSuiteCritic,
};
use crate::services::model_router::ModelRouter;
use crate::services::operations::{ExecutionOutcome, OperationsManager};
use crate::services::phase_machine::{Advance, PhaseMachine, PhaseMachineConfig};
use crate::services::quality_gate::{QualityGate, QualityGateConfig};
use crate::services::scheduler::Scheduler;
use crate::services::wip::WipController;

/// Process exit codes the CLI maps a Supervisor run onto (spec §6).
pub mod exit_code {
    pub const OK: i32 = 0;
    pub const GENERIC_FAILURE: i32 = 1;
    pub const CONFIG_VIOLATION: i32 = 2;
    pub const SAFETY_BREACH: i32 = 3;
    pub const LOCK_CONFLICT: i32 = 4;
    pub const SIGTERM: i32 = 143;
}

/// Why the run loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Stopped on operator command (`autopilot stop`) with no faults.
    Clean,
    Signal,
    SafetyBreach,
}

impl ShutdownReason {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Clean => exit_code::OK,
            Self::Signal => exit_code::SIGTERM,
            Self::SafetyBreach => exit_code::SAFETY_BREACH,
        }
    }
}

/// How often a worker with nothing to pull backs off before retrying.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Safety monitor polling cadence (spec §4.10's 10s tier).
const SAFETY_POLL_INTERVAL: Duration = Duration::from_secs(10);

pub struct Supervisor<T: TaskRepository + 'static> {
    config: Config,
    task_repo: Arc<T>,
    agent_pool: Arc<AgentPool>,
    evidence: Arc<dyn EvidenceStore>,
    audit: Arc<dyn AuditSink>,
    substrate: Arc<dyn AgentSubstrate>,
    tool_runner: Arc<dyn ToolRunner>,
    scheduler: Arc<Scheduler<T>>,
    phase_machine: Arc<PhaseMachine<T>>,
    model_router: Arc<ModelRouter>,
    quality_gate: Arc<QualityGate<T>>,
    operations: Arc<OperationsManager<T>>,
    wip: Arc<WipController>,
    safety: Arc<SafetyMonitor>,
    heartbeat: Arc<HeartbeatWriter>,
    shutdown_tx: broadcast::Sender<()>,
}

impl<T: TaskRepository + 'static> Supervisor<T> {
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        config: Config,
        task_repo: Arc<T>,
        agent_repo: Arc<dyn AgentRepository>,
        evidence: Arc<dyn EvidenceStore>,
        audit: Arc<dyn AuditSink>,
        substrate: Arc<dyn AgentSubstrate>,
        tool_runner: Arc<dyn ToolRunner>,
    ) -> Result<Self, AutopilotError> {
        let wip = Arc::new(WipController::new(config.effective_wip_global(), config.wip_per_worker));
        let scheduler = Arc::new(Scheduler::new(task_repo.clone(), wip.clone()));
        let phase_machine = Arc::new(PhaseMachine::new(task_repo.clone(), PhaseMachineConfig::default()));
        let model_router = Arc::new(ModelRouter::new(config.model_routing.clone()));
        let agent_pool = Arc::new(AgentPool::load(agent_repo).await?);
        let operations = Arc::new(OperationsManager::new(scheduler.clone(), audit.clone()));

        let critics: Vec<Arc<dyn crate::domain::ports::Critic>> = vec![
            Arc::new(BuildCritic::new(evidence.clone())),
            Arc::new(LintCritic::new(evidence.clone())),
            Arc::new(StructuralCritic::new(evidence.clone())),
            Arc::new(ReasoningCritic::new(evidence.clone())),
            Arc::new(TestSuiteCritic::new(evidence.clone())),
            Arc::new(SecurityScanCritic::new(evidence.clone())),
            Arc::new(ProcessCritic),
        ];
        let quality_gate = Arc::new(QualityGate::new(
            critics,
            task_repo.clone(),
            audit.clone(),
            evidence.clone(),
            QualityGateConfig {
                enable_quality_graph: config.enable_quality_graph,
                disable_peer_review: config.disable_peer_review,
                ..QualityGateConfig::default()
            },
        ));

        let probe = Arc::new(SystemResourceProbe::new(&config.state_root));
        let safety = Arc::new(SafetyMonitor::new(config.safety.clone(), probe, audit.clone()));
        let heartbeat = Arc::new(HeartbeatWriter::new(std::path::Path::new(&config.state_root)));

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            task_repo,
            agent_pool,
            evidence,
            audit,
            substrate,
            tool_runner,
            scheduler,
            phase_machine,
            model_router,
            quality_gate,
            operations,
            wip,
            safety,
            heartbeat,
            shutdown_tx,
        })
    }

    /// Runs worker, heartbeat, and safety loops until a shutdown signal,
    /// safety breach, or explicit stop request, and reports why.
    pub async fn run(self: Arc<Self>) -> ShutdownReason {
        self.audit
            .append_audit(&AuditEvent::new(AuditEventKind::Startup, Actor::Supervisor, "supervisor starting"))
            .await
            .ok();

        let (cause_tx, mut cause_rx) = mpsc::channel::<ShutdownReason>(4);
        let mut stop_rx = self.shutdown_tx.subscribe();

        let mut worker_handles = Vec::new();
        for i in 0..self.config.workers {
            let sup = self.clone();
            let worker_id = format!("worker-{i}");
            let mut shutdown_rx = self.shutdown_tx.subscribe();
            let cause_tx = cause_tx.clone();
            worker_handles.push(tokio::spawn(async move {
                sup.worker_loop(worker_id, &mut shutdown_rx, cause_tx).await;
            }));
        }

        {
            let sup = self.clone();
            let mut shutdown_rx = self.shutdown_tx.subscribe();
            tokio::spawn(async move { sup.heartbeat_loop(&mut shutdown_rx).await });
        }

        {
            let sup = self.clone();
            let mut shutdown_rx = self.shutdown_tx.subscribe();
            let cause_tx = cause_tx.clone();
            tokio::spawn(async move { sup.safety_loop(&mut shutdown_rx, cause_tx).await });
        }
        drop(cause_tx);

        let reason = tokio::select! {
            _ = wait_for_termination_signal() => ShutdownReason::Signal,
            Some(reason) = cause_rx.recv() => reason,
            _ = stop_rx.recv() => ShutdownReason::Clean,
        };

        let _ = self.shutdown_tx.send(());
        for handle in worker_handles {
            let _ = handle.await;
        }

        self.audit
            .append_audit(
                &AuditEvent::new(AuditEventKind::Shutdown, Actor::Supervisor, format!("{reason:?}")),
            )
            .await
            .ok();

        reason
    }

    async fn heartbeat_loop(&self, shutdown_rx: &mut broadcast::Receiver<()>) {
        let interval = Duration::from_millis(self.config.heartbeat_interval_ms);
        loop {
            if let Err(e) = self.heartbeat.beat(Utc::now()).await {
                warn!(error = %e, "heartbeat write failed");
            }
            tokio::select! {
                _ = shutdown_rx.recv() => return,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    async fn safety_loop(&self, shutdown_rx: &mut broadcast::Receiver<()>, cause_tx: mpsc::Sender<ShutdownReason>) {
        let mut last_check = (Instant::now(), 0.0f64);
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => return,
                _ = tokio::time::sleep(SAFETY_POLL_INTERVAL) => {}
            }

            let summary = self.operations.cost_summary().await;
            let elapsed_hours = last_check.0.elapsed().as_secs_f64() / 3600.0;
            let spend_rate = if elapsed_hours > 0.0 {
                (summary.total_usd - last_check.1).max(0.0) / elapsed_hours
            } else {
                0.0
            };
            last_check = (Instant::now(), summary.total_usd);

            if let Err(e) = self.safety.check(spend_rate).await {
                warn!(error = %e, "safety breach detected, requesting shutdown");
                let _ = cause_tx.send(ShutdownReason::SafetyBreach).await;
                return;
            }
        }
    }

    async fn worker_loop(
        self: Arc<Self>,
        worker_id: String,
        shutdown_rx: &mut broadcast::Receiver<()>,
        cause_tx: mpsc::Sender<ShutdownReason>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => return,
                _ = tokio::time::sleep(IDLE_POLL_INTERVAL) => {}
            }

            let task = match self.scheduler.pull(&worker_id).await {
                Ok(Some(task)) => task,
                Ok(None) => continue,
                Err(e) => {
                    warn!(worker_id, error = %e, "failed to pull from scheduler");
                    continue;
                }
            };

            let task_id = task.id;
            if let Err(e) = self.process_one(task, &worker_id).await {
                warn!(worker_id, task_id = %task_id, error = %e, "phase execution failed");
                if e.is_safety_breach() {
                    let _ = cause_tx.send(ShutdownReason::SafetyBreach).await;
                    return;
                }
            }
        }
    }

    async fn process_one(&self, mut task: Task, worker_id: &str) -> Result<(), AutopilotError> {
        if self.config.dry_run {
            info!(task_id = %task.id, %worker_id, "dry-run: skipping dispatch");
            self.scheduler.release(task.id).await;
            return Ok(());
        }

        task.status = TaskStatus::InProgress;
        self.task_repo.update(&task).await?;

        let result = self.dispatch_phase(&mut task).await;
        self.scheduler.release(task.id).await;
        result
    }

    async fn dispatch_phase(&self, task: &mut Task) -> Result<(), AutopilotError> {
        let phase = task.current_phase;
        let before = self.evidence.read_evidence(task.id, None).await?;
        self.quality_gate.pre_phase_gate(task, &before)?;

        let now = Utc::now();
        let candidates = self.agent_pool.snapshot().await;
        let selection = self.model_router.select_model(task, AgentTier::Worker, &candidates, now)?;

        let agent_id = candidates
            .iter()
            .find(|a| a.model == selection.model && a.is_available(now))
            .map(|a| a.id)
            .ok_or_else(|| AutopilotError::NoEligibleModel { tier: format!("{:?}", selection.complexity_tier) })?;
        self.agent_pool.claim(agent_id, task.id).await?;

        self.audit
            .append_audit(
                &AuditEvent::new(AuditEventKind::ModelRouted, Actor::ModelRouter, format!("routed to {}", selection.model))
                    .for_task(task.id)
                    .with_context(selection.as_audit_context()),
            )
            .await?;

        let worker = PhaseWorker::new(self.substrate.clone(), self.tool_runner.clone(), self.evidence.clone());
        let started = Instant::now();
        let dispatch_result = worker.execute(task, &selection).await;
        let duration = started.elapsed();

        let (sample, outcome) = match &dispatch_result {
            Ok(result) => (
                UsageSample { at: now, success: true, latency_ms: duration.as_millis() as u64, cost_usd: selection.cost_usd_estimate },
                Ok(result),
            ),
            Err(e) => (
                UsageSample { at: now, success: false, latency_ms: duration.as_millis() as u64, cost_usd: 0.0 },
                Err(e),
            ),
        };
        self.agent_pool.release(agent_id, sample).await?;
        self.operations.record_cost_sample(&selection.model, 0, 0).await;

        match outcome {
            Err(e) if matches!(e, AutopilotError::ContextOverflow { .. }) => {
                self.agent_pool.report_context_limit(agent_id, None).await?;
                self.advance_on_result(task, false, true).await?;
                self.feed_operations(false, 0.0, duration, false).await;
                Ok(())
            }
            Err(AutopilotError::Transient { retry_after_s, .. }) => {
                self.agent_pool.report_rate_limit(agent_id, retry_after_s).await?;
                self.advance_on_result(task, false, true).await?;
                self.feed_operations(false, 0.0, duration, true).await;
                Ok(())
            }
            Err(e) => {
                self.advance_on_result(task, false, e.is_retry_exempt()).await?;
                self.feed_operations(false, 0.0, duration, false).await;
                Err(AutopilotError::Integrity(e.to_string()))
            }
            Ok(result) => {
                let decision = self
                    .quality_gate
                    .post_phase_validation(task, phase, &result.evidence, result.duration)
                    .await?;
                let quality_score = decision.node.overall();

                if decision.blocking {
                    let requirement = if decision.confirmed_bypasses.is_empty() {
                        format!("quality gate blocked at {phase}")
                    } else {
                        format!(
                            "quality gate blocked at {phase}: {}",
                            decision
                                .confirmed_bypasses
                                .iter()
                                .map(|b| b.code())
                                .collect::<Vec<_>>()
                                .join(", ")
                        )
                    };
                    self.quality_gate.create_remediation(task, requirement).await?;
                    self.feed_operations(false, quality_score, duration, false).await;
                    return Ok(());
                }

                self.advance_on_result(task, true, false).await?;
                self.feed_operations(true, quality_score, duration, false).await;
                Ok(())
            }
        }
    }

    async fn advance_on_result(&self, task: &mut Task, success: bool, transient: bool) -> Result<(), AutopilotError> {
        let advance = self.phase_machine.record_outcome(task, success, transient).await?;
        match advance {
            Advance::Advanced(_) => {
                if task.status != TaskStatus::Blocked {
                    task.status = TaskStatus::Pending;
                    self.task_repo.update(task).await?;
                }
            }
            Advance::Finished => {
                let evidence = self.evidence.read_evidence(task.id, None).await?;
                task.status = if self.quality_gate.can_mark_done(task, &self.phase_machine, &evidence).await {
                    TaskStatus::Done
                } else {
                    TaskStatus::NeedsReview
                };
                self.task_repo.update(task).await?;

                if task.status == TaskStatus::Done && task.task_type == TaskType::Remediation {
                    self.unblock_remediation_parent(task).await?;
                }
            }
            Advance::CeilingExceeded { .. } => {}
        }
        Ok(())
    }

    /// A finished remediation task unblocks whatever it was raised against:
    /// find the parent holding it as its blocker and return it to the
    /// schedulable pool (spec §4.8 step 4).
    async fn unblock_remediation_parent(&self, remediation: &Task) -> Result<(), AutopilotError> {
        let Some(parent_id) = remediation.parent_id else {
            return Ok(());
        };
        let Some(mut parent) = self.task_repo.get(parent_id).await? else {
            return Ok(());
        };
        if !parent.is_blocked() {
            return Ok(());
        }

        parent.unblock();
        self.task_repo.update(&parent).await?;

        self.audit
            .append_audit(
                &AuditEvent::new(
                    AuditEventKind::RemediationCreated,
                    Actor::Supervisor,
                    format!("remediation {} done, parent {} unblocked", remediation.id, parent.id),
                )
                .for_task(parent.id),
            )
            .await?;
        info!(parent_id = %parent.id, remediation_id = %remediation.id, "remediation resolved, parent unblocked");
        Ok(())
    }

    async fn feed_operations(&self, success: bool, quality_score: f32, duration: Duration, rate_limited: bool) {
        let usage_ratio = self.agent_pool.usage_ratio(Utc::now()).await;
        let outcome = ExecutionOutcome {
            recorded_at: Utc::now(),
            quality_score,
            success,
            duration_ms: duration.as_millis() as u64,
            rate_limited,
        };
        if let Err(e) = self.operations.record_outcome(outcome, usage_ratio).await {
            warn!(error = %e, "operations manager failed to record outcome");
        }
    }

    /// Request a clean shutdown (`autopilot stop`), distinct from a signal
    /// or safety breach.
    pub fn request_stop(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub fn wip_status_handle(&self) -> Arc<WipController> {
        self.wip.clone()
    }
}

#[cfg(unix)]
async fn wait_for_termination_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    let mut sighup = signal(SignalKind::hangup()).expect("install SIGHUP handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
        _ = sighup.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_termination_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
