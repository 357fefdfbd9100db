//! Task repository port (C1 Evidence & Audit Store's task-table half).

use async_trait::async_trait;
use uuid::Uuid;

use super::errors::StoreResult;
use crate::domain::models::{Task, TaskStatus, TaskType};

/// Filter criteria for listing tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
    pub epic_id: Option<Uuid>,
    pub milestone_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
}

/// Repository interface for Task persistence. Implemented by
/// `adapters::sqlite::TaskRepository`.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &Task) -> StoreResult<()>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Task>>;

    async fn update(&self, task: &Task) -> StoreResult<()>;

    async fn delete(&self, id: Uuid) -> StoreResult<()>;

    async fn list(&self, filter: TaskFilter) -> StoreResult<Vec<Task>>;

    /// The whole roadmap, as a flat task table (`load_roadmap`, spec §4.1).
    async fn load_roadmap(&self) -> StoreResult<Vec<Task>>;

    async fn list_by_status(&self, status: TaskStatus) -> StoreResult<Vec<Task>>;

    async fn get_dependents(&self, task_id: Uuid) -> StoreResult<Vec<Task>>;
}
