//! Scheduling priority formula used by the Scheduler (C7).
//!
//! `priority = status_weight + complexity_bias * complexity_score +
//! staleness_bias * age_hours`, with ties broken by creation timestamp
//! (oldest first) then task id (spec §4.7).

use chrono::Utc;

use crate::domain::models::task::{Task, TaskStatus};

#[derive(Debug, Clone)]
pub struct PriorityCalculator {
    complexity_bias: f64,
    staleness_bias: f64,
}

impl Default for PriorityCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityCalculator {
    pub fn new() -> Self {
        Self {
            complexity_bias: 0.3,
            staleness_bias: 0.1,
        }
    }

    pub fn with_weights(complexity_bias: f64, staleness_bias: f64) -> Self {
        Self {
            complexity_bias,
            staleness_bias,
        }
    }

    /// Base weight by status: in-progress and needs-improvement tasks
    /// outrank fresh pending work so partially-done tasks finish first.
    fn status_weight(status: TaskStatus) -> f64 {
        match status {
            TaskStatus::NeedsImprovement => 5.0,
            TaskStatus::InProgress => 4.0,
            TaskStatus::NeedsReview => 3.0,
            TaskStatus::Pending => 2.0,
            TaskStatus::Blocked => 0.0,
            TaskStatus::Done | TaskStatus::Cancelled => -1.0,
        }
    }

    pub fn calculate(&self, task: &Task) -> f64 {
        let age_hours = (Utc::now() - task.created_at).num_seconds() as f64 / 3600.0;
        Self::status_weight(task.status)
            + self.complexity_bias * f64::from(task.complexity.score(task.current_phase))
            + self.staleness_bias * age_hours.max(0.0)
    }

    /// Sort `tasks` highest-priority first, tie-broken by creation time
    /// then id (spec §4.7).
    pub fn sort_by_priority<'a>(&self, tasks: &mut [&'a Task]) {
        tasks.sort_by(|a, b| {
            self.calculate(b)
                .partial_cmp(&self.calculate(a))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
    }
}
