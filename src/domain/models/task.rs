//! Task domain model — the unit of work driven through the phase lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::phase::Phase;

/// Status of a task (spec §4.6 phase state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    NeedsReview,
    NeedsImprovement,
    Blocked,
    Done,
    Cancelled,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::NeedsReview => "needs_review",
            Self::NeedsImprovement => "needs_improvement",
            Self::Blocked => "blocked",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "needs_review" => Some(Self::NeedsReview),
            "needs_improvement" => Some(Self::NeedsImprovement),
            "blocked" => Some(Self::Blocked),
            "done" => Some(Self::Done),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }

    /// Valid next statuses, per spec §4.6's transition table.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Pending => &[Self::InProgress, Self::Cancelled],
            Self::InProgress => &[
                Self::NeedsReview,
                Self::Blocked,
                Self::Done,
                Self::Cancelled,
            ],
            Self::NeedsReview => &[Self::InProgress, Self::Cancelled],
            Self::NeedsImprovement => &[Self::InProgress, Self::Cancelled],
            Self::Blocked => &[Self::Pending, Self::InProgress, Self::Cancelled],
            Self::Done => &[],
            Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What kind of node in the roadmap hierarchy this task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Epic,
    Milestone,
    Task,
    Group,
    Remediation,
}

impl Default for TaskType {
    fn default() -> Self {
        Self::Task
    }
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Epic => "epic",
            Self::Milestone => "milestone",
            Self::Task => "task",
            Self::Group => "group",
            Self::Remediation => "remediation",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "epic" => Some(Self::Epic),
            "milestone" => Some(Self::Milestone),
            "task" => Some(Self::Task),
            "group" => Some(Self::Group),
            "remediation" => Some(Self::Remediation),
            _ => None,
        }
    }
}

/// Why a task is currently blocked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blocker {
    /// Id of the blocking task, when the blocker is another task
    /// (e.g. an open remediation).
    pub blocking_task_id: Option<Uuid>,
    /// Human-readable condition, used when the blocker isn't a task
    /// (e.g. a rate-limited provider, a missing external input).
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

/// Per-phase attempt bookkeeping. Rate-limit/provider-outage attempts do not
/// count against the retry ceiling (spec §4.6).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PhaseAttempts {
    pub counted: u32,
    pub transient: u32,
}

/// Declared task complexity, 0-10, with the feature weights the Model
/// Router reads (spec §4.3 step 1).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ComplexityFactors {
    pub dependency_count: u32,
    pub epic_membership: bool,
    pub description_len: u32,
    pub ml_flag: bool,
    pub security_flag: bool,
    pub public_api_flag: bool,
    pub cross_domain_flag: bool,
    pub estimated_loc: u32,
}

impl ComplexityFactors {
    /// Compute the composite score in `[0, 10]` per spec §4.3 step 1.
    pub fn score(&self, phase: Phase) -> u8 {
        let mut score: f32 = 0.0;
        score += (self.dependency_count.min(5) as f32) * 0.4;
        if self.epic_membership {
            score += 1.0;
        }
        score += (self.description_len as f32 / 200.0).min(1.5);
        if self.ml_flag {
            score += 1.5;
        }
        if self.security_flag {
            score += 1.5;
        }
        if self.public_api_flag {
            score += 1.0;
        }
        if self.cross_domain_flag {
            score += 1.0;
        }

        let phase_weight = match phase {
            Phase::Review | Phase::Gate => 1.5,
            Phase::Strategize | Phase::Plan => 1.1,
            Phase::Spec | Phase::Implement => 1.0 + (self.estimated_loc as f32 / 500.0).min(1.0),
            _ => 1.0,
        };
        score *= phase_weight;

        score.round().clamp(0.0, 10.0) as u8
    }
}

/// Tier derived from a complexity score (spec §4.3 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTier {
    Simple,
    Moderate,
    Complex,
    /// Score of 10: critical, routed with extended thinking.
    Critical,
}

impl ComplexityTier {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=3 => Self::Simple,
            4..=6 => Self::Moderate,
            7..=9 => Self::Complex,
            _ => Self::Critical,
        }
    }

    pub fn escalate(&self) -> Self {
        match self {
            Self::Simple => Self::Moderate,
            Self::Moderate => Self::Complex,
            Self::Complex | Self::Critical => Self::Critical,
        }
    }
}

/// A unit of work driven through the fixed phase lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub parent_id: Option<Uuid>,
    pub epic_id: Option<Uuid>,
    pub milestone_id: Option<Uuid>,
    pub dependencies: Vec<Uuid>,
    pub complexity: ComplexityFactors,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub current_phase: Phase,
    pub gate_required: bool,
    pub attempts: HashMap<Phase, PhaseAttempts>,
    pub assigned_agent_id: Option<Uuid>,
    pub blocker: Option<Blocker>,
}

impl Task {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            task_type: TaskType::default(),
            status: TaskStatus::default(),
            parent_id: None,
            epic_id: None,
            milestone_id: None,
            dependencies: Vec::new(),
            complexity: ComplexityFactors::default(),
            created_at: now,
            updated_at: now,
            current_phase: Phase::Strategize,
            gate_required: false,
            attempts: HashMap::new(),
            assigned_agent_id: None,
            blocker: None,
        }
    }

    /// Create a remediation task synthesised by the Quality Gate
    /// (spec §4.8 step 4).
    pub fn new_remediation(parent: &Task, requirement: impl Into<String>) -> Self {
        let mut task = Self::new(
            format!("Remediation: {}", parent.title),
            requirement.into(),
        );
        task.task_type = TaskType::Remediation;
        task.parent_id = Some(parent.id);
        task
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self.status, TaskStatus::Blocked)
    }

    pub fn attempts_for(&self, phase: Phase) -> PhaseAttempts {
        self.attempts.get(&phase).copied().unwrap_or_default()
    }

    pub fn record_attempt(&mut self, phase: Phase, transient: bool) {
        let entry = self.attempts.entry(phase).or_default();
        if transient {
            entry.transient += 1;
        } else {
            entry.counted += 1;
        }
    }

    pub fn block(&mut self, blocking_task_id: Option<Uuid>, reason: impl Into<String>) {
        self.status = TaskStatus::Blocked;
        self.blocker = Some(Blocker {
            blocking_task_id,
            reason: reason.into(),
            recorded_at: Utc::now(),
        });
    }

    /// Clear a blocker and return the task to `Pending` so the Scheduler's
    /// `is_ready` check can pick it back up (spec §4.6) — `InProgress` would
    /// leave it permanently unreachable since nothing re-dispatches it.
    pub fn unblock(&mut self) {
        self.blocker = None;
        self.status = TaskStatus::Pending;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_starts_pending_at_strategize() {
        let t = Task::new("Fix typo", "short");
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.current_phase, Phase::Strategize);
        assert!(!t.gate_required);
    }

    #[test]
    fn remediation_task_is_parented() {
        let parent = Task::new("Big change", "desc");
        let remediation = Task::new_remediation(&parent, "produce design artifact");
        assert_eq!(remediation.task_type, TaskType::Remediation);
        assert_eq!(remediation.parent_id, Some(parent.id));
    }

    #[test]
    fn status_transition_table_excludes_done_and_cancelled() {
        assert!(TaskStatus::Done.valid_transitions().is_empty());
        assert!(TaskStatus::Cancelled.valid_transitions().is_empty());
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::InProgress));
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Done));
    }

    #[test]
    fn complexity_score_clamped_to_ten() {
        let factors = ComplexityFactors {
            dependency_count: 20,
            epic_membership: true,
            description_len: 5000,
            ml_flag: true,
            security_flag: true,
            public_api_flag: true,
            cross_domain_flag: true,
            estimated_loc: 10000,
        };
        assert_eq!(factors.score(Phase::Review), 10);
        assert_eq!(ComplexityTier::from_score(10), ComplexityTier::Critical);
    }

    #[test]
    fn complexity_tier_boundaries() {
        assert_eq!(ComplexityTier::from_score(0), ComplexityTier::Simple);
        assert_eq!(ComplexityTier::from_score(3), ComplexityTier::Simple);
        assert_eq!(ComplexityTier::from_score(4), ComplexityTier::Moderate);
        assert_eq!(ComplexityTier::from_score(6), ComplexityTier::Moderate);
        assert_eq!(ComplexityTier::from_score(7), ComplexityTier::Complex);
        assert_eq!(ComplexityTier::from_score(9), ComplexityTier::Complex);
    }

    #[test]
    fn block_and_unblock_round_trip() {
        let mut t = Task::new("T", "d");
        t.status = TaskStatus::InProgress;
        t.block(None, "provider cooldown exceeds threshold");
        assert!(t.is_blocked());
        assert!(t.blocker.is_some());
        t.unblock();
        assert!(!t.is_blocked());
        assert!(t.blocker.is_none());
        assert_eq!(t.status, TaskStatus::Pending);
    }

    #[test]
    fn record_attempt_separates_transient_from_counted() {
        let mut t = Task::new("T", "d");
        t.record_attempt(Phase::Implement, false);
        t.record_attempt(Phase::Implement, true);
        t.record_attempt(Phase::Implement, true);
        let attempts = t.attempts_for(Phase::Implement);
        assert_eq!(attempts.counted, 1);
        assert_eq!(attempts.transient, 2);
    }
}
