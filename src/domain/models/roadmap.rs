//! Roadmap — the ingested hierarchy of epics/milestones/tasks (spec §3, §4.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::Task;

/// The ingested roadmap: a flat task table plus a computed hierarchy index.
/// `load_roadmap` reconstructs this from the store; ingestion itself
/// (external format parsing) is out of scope per spec §1 Non-goals — the
/// orchestrator consumes an already-materialized `Vec<Task>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roadmap {
    pub tasks: Vec<Task>,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl Roadmap {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            loaded_at: Some(Utc::now()),
        }
    }

    pub fn find(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn find_mut(&mut self, id: Uuid) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn children_of(&self, parent_id: Uuid) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.parent_id == Some(parent_id))
            .collect()
    }

    /// All tasks rooted under an epic, recursively via parent chain.
    pub fn under_epic(&self, epic_id: Uuid) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.epic_id == Some(epic_id) || t.id == epic_id)
            .collect()
    }

    pub fn upsert(&mut self, task: Task) {
        if let Some(existing) = self.find_mut(task.id) {
            *existing = task;
        } else {
            self.tasks.push(task);
        }
    }
}
