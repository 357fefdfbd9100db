//! Quality Gate & Remediation Loop (C8) — the integrity spine between every
//! phase transition and between attempting `done` and actually reaching it
//! (spec §4.8).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::domain::errors::AutopilotError;
use crate::domain::models::bypass_pattern::{BypassDetector, BypassPattern, BypassSignal};
use crate::domain::models::quality_graph::{Dimension, HistoricalPatternStore, QualityGraphNode};
use crate::domain::models::{AuditEvent, AuditEventKind, Actor, EvidenceBundle, Phase, Task};
use crate::domain::ports::critic::{Critic, Report, ReportStatus, Severity};
use crate::domain::ports::{AuditSink, EvidenceStore, TaskRepository};
use crate::services::phase_machine::PhaseMachine;

/// Below this complexity score (spec §4.8 step 2's threshold, `[0,10]`) a
/// task is cheap enough that the Reasoning Critic's pre-mortem requirement
/// and BP003's short-duration check don't apply — a trivial task finishing
/// fast is normal, not suspicious.
pub const COMPLEXITY_GATE_THRESHOLD: u8 = 4;

/// Evidence under this size is too small for the entropy check to mean
/// anything; skip rather than flag noise.
const TEMPLATE_MIN_BYTES: usize = 32;

/// Entropy (bits/byte) below which content reads as repetitive/templated
/// rather than genuine prose or code.
const LOW_ENTROPY_THRESHOLD: f64 = 3.0;

/// Marker substrings left behind by unedited scaffolding.
const TEMPLATE_MARKERS: [&str; 6] = ["lorem ipsum", "{{", "placeholder", "tbd", "fixme", "xxx"];

/// Below this wall-clock duration, a complex phase's completion looks
/// suspiciously fast (spec §4.8 step 3's BP003).
const SHORT_DURATION_THRESHOLD: Duration = Duration::from_millis(500);

/// Below this total evidence size, a complex phase's output looks too thin
/// to represent real work.
const SHORT_DURATION_MIN_BYTES: u64 = 64;

/// Calibrated minimum scores below which a dimension flags an anomaly
/// (spec §4.8 step 2). Only these four gate `blocking`; the rest of the
/// 15-dimension vector is informational.
#[derive(Debug, Clone)]
pub struct QualityThresholds {
    pub completeness: f32,
    pub correctness: f32,
    pub evidence_strength: f32,
    pub historical_match: f32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            completeness: 0.7,
            correctness: 0.8,
            evidence_strength: 0.6,
            historical_match: 0.4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QualityGateConfig {
    pub thresholds: QualityThresholds,
    pub enable_quality_graph: bool,
    pub disable_peer_review: bool,
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            thresholds: QualityThresholds::default(),
            enable_quality_graph: true,
            disable_peer_review: false,
        }
    }
}

/// Outcome of running post-phase validation.
#[derive(Debug, Clone)]
pub struct GateDecision {
    pub node: QualityGraphNode,
    pub confirmed_bypasses: Vec<BypassPattern>,
    pub blocking: bool,
}

pub struct QualityGate<T: TaskRepository + 'static> {
    critics: Vec<Arc<dyn Critic>>,
    task_repo: Arc<T>,
    audit: Arc<dyn AuditSink>,
    evidence_store: Arc<dyn EvidenceStore>,
    historical: RwLock<HistoricalPatternStore>,
    config: QualityGateConfig,
}

impl<T: TaskRepository + 'static> QualityGate<T> {
    pub fn new(
        critics: Vec<Arc<dyn Critic>>,
        task_repo: Arc<T>,
        audit: Arc<dyn AuditSink>,
        evidence_store: Arc<dyn EvidenceStore>,
        config: QualityGateConfig,
    ) -> Self {
        Self {
            critics,
            task_repo,
            audit,
            evidence_store,
            historical: RwLock::new(HistoricalPatternStore::default()),
            config,
        }
    }

    /// Step 1: confirm the task's declared intent still applies before
    /// entering `task.current_phase`, and that GATE produced its design
    /// artifact before Implement begins.
    pub fn pre_phase_gate(&self, task: &Task, evidence: &EvidenceBundle) -> Result<(), AutopilotError> {
        if task.current_phase != Phase::Strategize && !evidence.has_all(&["strategy.md"]) {
            return Err(AutopilotError::ValidationFailed(
                "task has no recorded strategy; intent no longer verifiable".into(),
            ));
        }
        if !matches!(task.current_phase, Phase::Strategize | Phase::Spec)
            && !evidence.has_all(&["spec.md"])
        {
            return Err(AutopilotError::ValidationFailed(
                "task has no recorded spec; intent no longer verifiable".into(),
            ));
        }
        if task.current_phase == Phase::Implement
            && task.gate_required
            && !evidence.has_all(&["design.md"])
        {
            return Err(AutopilotError::ValidationFailed(
                "GATE design artifact missing before Implement".into(),
            ));
        }
        Ok(())
    }

    fn applicable_critics(&self, task: &Task, phase: Phase) -> Vec<&Arc<dyn Critic>> {
        let mut applicable: Vec<&Arc<dyn Critic>> = self
            .critics
            .iter()
            .filter(|c| c.applicable_phases().contains(&phase))
            // The Reasoning Critic's own contract (see its doc comment) only
            // applies once a task clears the complexity threshold; cheap
            // tasks aren't expected to write a pre-mortem.
            .filter(|c| c.name() != "reasoning" || task.complexity.score(phase) >= COMPLEXITY_GATE_THRESHOLD)
            .collect();
        applicable.sort_by_key(|c| c.cost());
        applicable
    }

    /// Step 2+3: run every critic applicable to `phase`, cheapest first, and
    /// fold their findings into a quality-graph node and bypass signals.
    /// `duration` is the phase worker's own execution timer, used by BP003's
    /// short-duration check.
    pub async fn post_phase_validation(
        &self,
        task: &Task,
        phase: Phase,
        evidence: &EvidenceBundle,
        duration: Duration,
    ) -> Result<GateDecision, AutopilotError> {
        let applicable = self.applicable_critics(task, phase);

        let mut node = QualityGraphNode::new(task.id);
        let mut detector = BypassDetector::default();
        let mut blocking = false;

        let mut reports: Vec<(String, Report)> = Vec::new();
        let mut total_findings = 0usize;
        let mut blocking_findings = 0usize;

        for critic in applicable {
            let report = critic.measure(evidence).await?;
            self.audit
                .append_audit(
                    &AuditEvent::new(
                        AuditEventKind::CriticReport,
                        Actor::Critic(critic.name().to_string()),
                        format!("{}: {:?}", critic.name(), report.status),
                    )
                    .for_task(task.id),
                )
                .await?;

            total_findings += report.findings.len();
            blocking_findings += report.findings.iter().filter(|f| f.severity == Severity::Blocking).count();

            if report.status == ReportStatus::Fail && critic.is_authoritative() {
                blocking = true;
            }

            reports.push((critic.name().to_string(), report));
        }

        self.detect_bp001_partial_completion(task, phase, evidence, &reports, &mut detector);
        self.detect_bp002_template_evidence(task, phase, evidence, &mut detector).await?;
        self.detect_bp003_short_duration(task, phase, evidence, duration, &mut detector);
        self.detect_bp004_missing_self_checks(phase, evidence, &reports, &mut detector);

        if self.config.enable_quality_graph {
            self.populate_dimensions(&mut node, &reports, total_findings, blocking_findings, evidence).await;

            if node.get(Dimension::Completeness) < self.config.thresholds.completeness
                || node.get(Dimension::Correctness) < self.config.thresholds.correctness
                || node.get(Dimension::EvidenceStrength) < self.config.thresholds.evidence_strength
                || node.get(Dimension::HistoricalMatch) < self.config.thresholds.historical_match
            {
                blocking = true;
            }
        }

        let confirmed_bypasses = detector.confirmed();
        if !confirmed_bypasses.is_empty() {
            blocking = true;
            for pattern in &confirmed_bypasses {
                self.audit
                    .append_audit(
                        &AuditEvent::new(
                            AuditEventKind::BypassDetected,
                            Actor::QualityGate,
                            format!("{} confirmed: {}", pattern.code(), pattern.description()),
                        )
                        .for_task(task.id),
                    )
                    .await?;
            }
        }

        Ok(GateDecision { node, confirmed_bypasses, blocking })
    }

    /// BP001: a phase reports complete with some of its required artifacts
    /// missing. Corroborated by the artifact-presence check itself and,
    /// independently, the Process Critic's own findings.
    fn detect_bp001_partial_completion(
        &self,
        _task: &Task,
        phase: Phase,
        evidence: &EvidenceBundle,
        reports: &[(String, Report)],
        detector: &mut BypassDetector,
    ) {
        let missing = evidence.missing(phase.required_artifacts());
        if !missing.is_empty() {
            detector.record(BypassSignal {
                pattern: BypassPattern::Bp001PartialCompletion,
                source: "evidence_presence".into(),
                detail: format!("{phase} missing required artifacts: {missing:?}"),
            });
        }
        if reports.iter().any(|(name, r)| name == "process" && r.status == ReportStatus::Fail) {
            detector.record(BypassSignal {
                pattern: BypassPattern::Bp001PartialCompletion,
                source: "process_critic".into(),
                detail: "process critic reports required artifacts missing".into(),
            });
        }
    }

    /// BP002: evidence content reads like unedited template/boilerplate.
    /// Corroborated by a low-entropy byte distribution and, independently,
    /// an explicit scaffolding marker substring.
    async fn detect_bp002_template_evidence(
        &self,
        task: &Task,
        phase: Phase,
        evidence: &EvidenceBundle,
        detector: &mut BypassDetector,
    ) -> Result<(), AutopilotError> {
        for artifact in evidence.artifacts.iter().filter(|a| a.phase == phase) {
            let content = self.evidence_store.read_artifact(task.id, phase, &artifact.name).await?;
            if content.len() >= TEMPLATE_MIN_BYTES {
                let entropy = shannon_entropy(&content);
                if entropy < LOW_ENTROPY_THRESHOLD {
                    detector.record(BypassSignal {
                        pattern: BypassPattern::Bp002TemplateEvidence,
                        source: "entropy_scan".into(),
                        detail: format!("{} entropy {entropy:.2} bits/byte", artifact.name),
                    });
                }
            }
            let lower = String::from_utf8_lossy(&content).to_lowercase();
            if TEMPLATE_MARKERS.iter().any(|m| lower.contains(m)) {
                detector.record(BypassSignal {
                    pattern: BypassPattern::Bp002TemplateEvidence,
                    source: "marker_scan".into(),
                    detail: format!("{} contains unedited template markers", artifact.name),
                });
            }
        }
        Ok(())
    }

    /// BP003: a phase completed in implausibly little time for its
    /// complexity. Gated behind the same complexity threshold as the
    /// Reasoning Critic — a simple task finishing fast is unremarkable.
    /// Corroborated by the wall-clock timer and, independently, the total
    /// evidence size produced.
    fn detect_bp003_short_duration(
        &self,
        task: &Task,
        phase: Phase,
        evidence: &EvidenceBundle,
        duration: Duration,
        detector: &mut BypassDetector,
    ) {
        if task.complexity.score(phase) < COMPLEXITY_GATE_THRESHOLD {
            return;
        }
        if duration < SHORT_DURATION_THRESHOLD {
            detector.record(BypassSignal {
                pattern: BypassPattern::Bp003ShortDuration,
                source: "phase_timer".into(),
                detail: format!("{phase} completed in {duration:?}"),
            });
        }
        let total_bytes: u64 = evidence.artifacts.iter().filter(|a| a.phase == phase).map(|a| a.size_bytes).sum();
        if total_bytes > 0 && total_bytes < SHORT_DURATION_MIN_BYTES {
            detector.record(BypassSignal {
                pattern: BypassPattern::Bp003ShortDuration,
                source: "artifact_size".into(),
                detail: format!("{phase} produced only {total_bytes} bytes"),
            });
        }
    }

    /// BP004: a phase that requires a self-check (lint, tests, reasoning) has
    /// none. Corroborated by the critic's absence from the run and,
    /// independently, the specific artifact it would have produced.
    fn detect_bp004_missing_self_checks(
        &self,
        phase: Phase,
        evidence: &EvidenceBundle,
        reports: &[(String, Report)],
        detector: &mut BypassDetector,
    ) {
        let Some((critic_name, artifact_name)) = expected_self_check(phase) else {
            return;
        };
        if !reports.iter().any(|(name, _)| name == critic_name) {
            detector.record(BypassSignal {
                pattern: BypassPattern::Bp004MissingSelfChecks,
                source: "critic_registry".into(),
                detail: format!("no {critic_name} critic ran for {phase}"),
            });
        }
        if !evidence.has_all(&[artifact_name]) {
            detector.record(BypassSignal {
                pattern: BypassPattern::Bp004MissingSelfChecks,
                source: "artifact_presence".into(),
                detail: format!("{artifact_name} missing for {phase}"),
            });
        }
    }

    /// Populates all 15 dimensions from the critic reports just collected,
    /// the evidence bundle, and the running historical-pattern store.
    async fn populate_dimensions(
        &self,
        node: &mut QualityGraphNode,
        reports: &[(String, Report)],
        total_findings: usize,
        blocking_findings: usize,
        evidence: &EvidenceBundle,
    ) {
        let score_for = |name: &str| -> f32 {
            reports
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, r)| status_score(r.status))
                .unwrap_or(1.0)
        };

        // Completeness: did the phase produce everything it was supposed to.
        node.set(Dimension::Completeness, score_for("process"));
        // Correctness: does it build and pass its tests.
        node.set(Dimension::Correctness, (score_for("build") + score_for("test-suite")) / 2.0);
        node.set(Dimension::Coverage, score_for("test-suite"));
        node.set(Dimension::Consistency, score_for("lint"));
        // No critic measures runtime performance directly; a large diff is
        // the closest available proxy for unverified performance risk.
        node.set(Dimension::Performance, score_for("structural"));
        node.set(Dimension::Security, score_for("security-scan"));
        node.set(Dimension::Maintainability, (score_for("lint") + score_for("structural")) / 2.0);
        node.set(Dimension::Scalability, score_for("structural"));
        node.set(Dimension::EvidenceStrength, evidence_strength(evidence));
        node.set(Dimension::PeerAgreement, peer_agreement(reports));
        node.set(Dimension::RiskMitigation, (score_for("security-scan") + score_for("build")) / 2.0);
        node.set(Dimension::IntentAlignment, score_for("reasoning"));
        node.set(Dimension::PurposeConnection, 1.0 - ratio(blocking_findings.min(5), 5));
        node.set(Dimension::OutcomeAlignment, 1.0 - ratio(total_findings.min(5), 5));

        // HistoricalMatch is scored against patterns recorded so far, with
        // this node's own (not-yet-set) slot contributing a neutral zero on
        // both sides of the comparison — then the finished vector joins the
        // pattern store for future tasks to compare against.
        let similarity = self.historical.read().await.nearest_similarity(&node.scores);
        node.set(Dimension::HistoricalMatch, similarity);
        self.historical.write().await.record(node.scores);
    }

    /// Step 4: synthesise a remediation task, block the parent, and audit.
    pub async fn create_remediation(
        &self,
        parent: &mut Task,
        requirement: impl Into<String>,
    ) -> Result<Task, AutopilotError> {
        let requirement = requirement.into();
        let remediation = Task::new_remediation(parent, requirement.clone());
        self.task_repo.create(&remediation).await?;

        parent.block(Some(remediation.id), format!("blocked by remediation: {requirement}"));
        self.task_repo.update(parent).await?;

        self.audit
            .append_audit(
                &AuditEvent::new(
                    AuditEventKind::RemediationCreated,
                    Actor::QualityGate,
                    format!("remediation {} created: {requirement}", remediation.id),
                )
                .for_task(parent.id),
            )
            .await?;
        warn!(task_id = %parent.id, remediation_id = %remediation.id, "remediation created");

        Ok(remediation)
    }

    /// Step 5: 2-of-3 peer-review consensus, invoking `tie_breaker` only
    /// when the first two reviewers split.
    pub fn peer_review_consensus(
        first_approves: bool,
        second_approves: bool,
        tie_breaker: impl FnOnce() -> bool,
    ) -> bool {
        match (first_approves, second_approves) {
            (true, true) => true,
            (false, false) => false,
            _ => tie_breaker(),
        }
    }

    /// Step 6: a task may only be marked `done` once every `DONE_REQUIRED`
    /// phase has left behind the evidence a critic could verify, no
    /// blocking remediation remains open, and (if triggered) GATE's design
    /// artifact exists. Emits BP005 ("claim without proof") when a caller
    /// attempts the transition with one of those unmet.
    pub async fn can_mark_done(
        &self,
        task: &Task,
        phase_machine: &PhaseMachine<T>,
        evidence: &EvidenceBundle,
    ) -> bool {
        if task.blocker.is_some() {
            return false;
        }

        let mut detector = BypassDetector::default();
        if task.gate_required && !evidence.has_all(&["design.md"]) {
            detector.record(BypassSignal {
                pattern: BypassPattern::Bp005ClaimWithoutProof,
                source: "gate_requirement".into(),
                detail: "design.md missing with GATE required".into(),
            });
        }
        for phase in Phase::DONE_REQUIRED {
            if !evidence.has_all(phase.required_artifacts()) {
                detector.record(BypassSignal {
                    pattern: BypassPattern::Bp005ClaimWithoutProof,
                    source: format!("phase_evidence:{phase}"),
                    detail: format!("{phase} missing required artifacts"),
                });
            }
        }
        for pattern in detector.confirmed() {
            self.audit
                .append_audit(
                    &AuditEvent::new(
                        AuditEventKind::BypassDetected,
                        Actor::QualityGate,
                        format!("{} confirmed at done-check: {}", pattern.code(), pattern.description()),
                    )
                    .for_task(task.id),
                )
                .await
                .ok();
        }

        if task.gate_required && !evidence.has_all(&["design.md"]) {
            return false;
        }
        phase_machine.meets_done_requirement(task, evidence)
    }

    pub fn task_id(&self, task: &Task) -> Uuid {
        task.id
    }
}

fn status_score(status: ReportStatus) -> f32 {
    match status {
        ReportStatus::Pass => 1.0,
        ReportStatus::Warn => 0.6,
        ReportStatus::Fail => 0.0,
    }
}

/// Critic name / self-check artifact a given phase is expected to produce,
/// used by BP004. Phases with no self-check requirement return `None`.
fn expected_self_check(phase: Phase) -> Option<(&'static str, &'static str)> {
    match phase {
        Phase::Implement => Some(("lint", "lint.log")),
        Phase::Verify => Some(("test-suite", "test.log")),
        Phase::Think => Some(("reasoning", "think.md")),
        _ => None,
    }
}

/// Fraction of the critics that ran against this phase and agreed
/// (`Pass`) — a stand-in for human peer-review agreement until a real
/// reviewer signal exists (see DESIGN.md's Open Question decision).
fn peer_agreement(reports: &[(String, Report)]) -> f32 {
    if reports.is_empty() {
        return 1.0;
    }
    let agreeing = reports.iter().filter(|(_, r)| r.status == ReportStatus::Pass).count();
    agreeing as f32 / reports.len() as f32
}

/// Evidence strength grows with how much substantive artifact content a
/// phase produced, saturating at a modest size so a single huge artifact
/// doesn't dominate the score.
fn evidence_strength(evidence: &EvidenceBundle) -> f32 {
    if evidence.artifacts.is_empty() {
        return 0.0;
    }
    let total_bytes: u64 = evidence.artifacts.iter().map(|a| a.size_bytes).sum();
    ratio((total_bytes.min(500)) as usize, 500)
}

fn ratio(count: usize, max: usize) -> f32 {
    if max == 0 {
        0.0
    } else {
        count as f32 / max as f32
    }
}

/// Shannon entropy in bits/byte, used by BP002's low-entropy check.
fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut counts = [0u32; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    let len = data.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / len;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::evidence::EvidenceArtifact;
    use crate::domain::ports::errors::StoreResult;
    use crate::domain::ports::store::AuditFilter;
    use crate::domain::ports::task_repository::TaskFilter;
    use crate::services::phase_machine::PhaseMachineConfig;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

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
        async fn list_by_status(&self, status: crate::domain::models::TaskStatus) -> StoreResult<Vec<Task>> {
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

    #[derive(Default)]
    struct InMemoryEvidenceStore {
        content: Mutex<HashMap<(Uuid, Phase, String), Vec<u8>>>,
    }

    #[async_trait]
    impl EvidenceStore for InMemoryEvidenceStore {
        async fn append_evidence(
            &self,
            task_id: Uuid,
            phase: Phase,
            name: &str,
            content: &[u8],
        ) -> StoreResult<EvidenceArtifact> {
            let artifact = EvidenceArtifact::new(task_id, phase, name, content);
            self.content.lock().unwrap().insert((task_id, phase, name.to_string()), content.to_vec());
            Ok(artifact)
        }
        async fn read_evidence(&self, _task_id: Uuid, _phase: Option<Phase>) -> StoreResult<EvidenceBundle> {
            Ok(EvidenceBundle::default())
        }
        async fn read_artifact(&self, task_id: Uuid, phase: Phase, name: &str) -> StoreResult<Vec<u8>> {
            Ok(self.content.lock().unwrap().get(&(task_id, phase, name.to_string())).cloned().unwrap_or_default())
        }
    }

    fn gate() -> QualityGate<InMemoryTaskRepo> {
        QualityGate::new(
            vec![],
            Arc::new(InMemoryTaskRepo::default()),
            Arc::new(InMemoryAuditSink::default()),
            Arc::new(InMemoryEvidenceStore::default()),
            QualityGateConfig::default(),
        )
    }

    #[test]
    fn pre_phase_gate_requires_strategy_before_spec() {
        let g = gate();
        let mut task = Task::new("T", "d");
        task.current_phase = Phase::Spec;
        let empty = EvidenceBundle::default();
        assert!(g.pre_phase_gate(&task, &empty).is_err());
    }

    #[test]
    fn pre_phase_gate_requires_design_before_implement_when_gated() {
        let g = gate();
        let mut task = Task::new("T", "d");
        task.current_phase = Phase::Implement;
        task.gate_required = true;
        let bundle = EvidenceBundle {
            artifacts: vec![
                EvidenceArtifact::new(task.id, Phase::Strategize, "strategy.md", b"x"),
                EvidenceArtifact::new(task.id, Phase::Spec, "spec.md", b"x"),
            ],
        };
        assert!(g.pre_phase_gate(&task, &bundle).is_err());
    }

    #[tokio::test]
    async fn post_phase_validation_passes_with_no_critics() {
        let g = gate();
        let task = Task::new("T", "d");
        let bundle = EvidenceBundle {
            artifacts: vec![EvidenceArtifact::new(task.id, Phase::Strategize, "strategy.md", b"x")],
        };
        let decision = g.post_phase_validation(&task, Phase::Strategize, &bundle, Duration::from_secs(5)).await.unwrap();
        assert!(!decision.blocking);
    }

    #[tokio::test]
    async fn low_complexity_task_never_trips_short_duration_bypass() {
        let g = gate();
        let task = Task::new("T", "d");
        let bundle = EvidenceBundle {
            artifacts: vec![EvidenceArtifact::new(task.id, Phase::Strategize, "strategy.md", b"x")],
        };
        let decision = g
            .post_phase_validation(&task, Phase::Strategize, &bundle, Duration::from_millis(1))
            .await
            .unwrap();
        assert!(!decision.confirmed_bypasses.contains(&BypassPattern::Bp003ShortDuration));
    }

    #[tokio::test]
    async fn high_complexity_fast_tiny_phase_confirms_short_duration_bypass() {
        let g = gate();
        let mut task = Task::new("T", "complex security change");
        task.complexity.security_flag = true;
        task.complexity.cross_domain_flag = true;
        task.complexity.public_api_flag = true;
        assert!(task.complexity.score(Phase::Implement) >= COMPLEXITY_GATE_THRESHOLD);
        task.current_phase = Phase::Implement;
        let bundle = EvidenceBundle {
            artifacts: vec![EvidenceArtifact::new(task.id, Phase::Implement, "implement.log", b"ok")],
        };
        let decision = g
            .post_phase_validation(&task, Phase::Implement, &bundle, Duration::from_millis(1))
            .await
            .unwrap();
        assert!(decision.confirmed_bypasses.contains(&BypassPattern::Bp003ShortDuration));
        assert!(decision.blocking);
    }

    #[tokio::test]
    async fn template_marker_and_low_entropy_confirm_hollow_evidence_bypass() {
        let g = gate();
        let task = Task::new("T", "d");
        let content = "x".repeat(64) + " placeholder ";
        g.evidence_store.append_evidence(task.id, Phase::Spec, "spec.md", content.as_bytes()).await.unwrap();
        let bundle = EvidenceBundle {
            artifacts: vec![EvidenceArtifact::new(task.id, Phase::Spec, "spec.md", content.as_bytes())],
        };
        let decision = g.post_phase_validation(&task, Phase::Spec, &bundle, Duration::from_secs(10)).await.unwrap();
        assert!(decision.confirmed_bypasses.contains(&BypassPattern::Bp002TemplateEvidence));
    }

    #[test]
    fn peer_review_consensus_approves_on_unanimous() {
        assert!(QualityGate::<InMemoryTaskRepo>::peer_review_consensus(true, true, || false));
    }

    #[test]
    fn peer_review_consensus_uses_tie_breaker_on_split() {
        assert!(QualityGate::<InMemoryTaskRepo>::peer_review_consensus(true, false, || true));
        assert!(!QualityGate::<InMemoryTaskRepo>::peer_review_consensus(true, false, || false));
    }

    #[tokio::test]
    async fn create_remediation_blocks_parent() {
        let g = gate();
        let mut parent = Task::new("parent", "d");
        g.task_repo.create(&parent).await.unwrap();
        let remediation = g.create_remediation(&mut parent, "add missing tests").await.unwrap();
        assert!(parent.is_blocked());
        assert_eq!(parent.blocker.unwrap().blocking_task_id, Some(remediation.id));
    }

    #[tokio::test]
    async fn can_mark_done_false_while_blocked() {
        let g = gate();
        let task_repo = Arc::new(InMemoryTaskRepo::default());
        let machine = PhaseMachine::new(task_repo.clone(), PhaseMachineConfig::default());
        let mut task = Task::new("T", "d");
        task.block(None, "manual hold");
        let empty = EvidenceBundle::default();
        assert!(!g.can_mark_done(&task, &machine, &empty).await);
    }

    #[tokio::test]
    async fn can_mark_done_false_when_done_required_phase_has_no_evidence() {
        let g = gate();
        let task_repo = Arc::new(InMemoryTaskRepo::default());
        let machine = PhaseMachine::new(task_repo.clone(), PhaseMachineConfig::default());
        let task = Task::new("T", "d");
        let empty = EvidenceBundle::default();
        assert!(!g.can_mark_done(&task, &machine, &empty).await);
    }

    #[tokio::test]
    async fn can_mark_done_true_once_every_done_required_phase_has_evidence() {
        let g = gate();
        let task_repo = Arc::new(InMemoryTaskRepo::default());
        let machine = PhaseMachine::new(task_repo.clone(), PhaseMachineConfig::default());
        let task = Task::new("T", "d");
        let bundle = EvidenceBundle {
            artifacts: vec![
                EvidenceArtifact::new(task.id, Phase::Strategize, "strategy.md", b"x"),
                EvidenceArtifact::new(task.id, Phase::Spec, "spec.md", b"x"),
                EvidenceArtifact::new(task.id, Phase::Plan, "plan.md", b"x"),
                EvidenceArtifact::new(task.id, Phase::Think, "think.md", b"x"),
                EvidenceArtifact::new(task.id, Phase::Verify, "verify.log", b"x"),
                EvidenceArtifact::new(task.id, Phase::Review, "review.md", b"x"),
            ],
        };
        assert!(g.can_mark_done(&task, &machine, &bundle).await);
    }
}
