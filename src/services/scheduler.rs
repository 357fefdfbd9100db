//! Task Scheduler (C7) — priority queue over ready tasks.
//!
//! Readiness = `status ∈ {pending, needs_review, needs_improvement}` AND all
//! dependencies done AND, for remediation tasks, the parent is still active
//! (spec §4.7).

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::domain::errors::AutopilotError;
use crate::domain::models::task::{Task, TaskStatus, TaskType};
use crate::domain::ports::task_repository::TaskFilter;
use crate::domain::ports::TaskRepository;
use crate::services::priority_calculator::PriorityCalculator;
use crate::services::wip::WipController;

const READY_STATUSES: [TaskStatus; 3] = [
    TaskStatus::Pending,
    TaskStatus::NeedsReview,
    TaskStatus::NeedsImprovement,
];

pub struct Scheduler<T: TaskRepository + 'static> {
    task_repo: Arc<T>,
    wip: Arc<WipController>,
    profile: tokio::sync::RwLock<PriorityCalculator>,
}

impl<T: TaskRepository + 'static> Scheduler<T> {
    pub fn new(task_repo: Arc<T>, wip: Arc<WipController>) -> Self {
        Self {
            task_repo,
            wip,
            profile: tokio::sync::RwLock::new(PriorityCalculator::new()),
        }
    }

    /// Atomically replace the priority-scoring weights, per the Operations
    /// Manager's mode-driven `set_priority_profile` (spec §4.9).
    pub async fn set_priority_profile(&self, profile: PriorityCalculator) {
        *self.profile.write().await = profile;
    }

    async fn is_ready(&self, task: &Task) -> Result<bool, AutopilotError> {
        if !READY_STATUSES.contains(&task.status) {
            return Ok(false);
        }
        for dep_id in &task.dependencies {
            match self.task_repo.get(*dep_id).await? {
                Some(dep) if dep.status == TaskStatus::Done => {}
                _ => return Ok(false),
            }
        }
        if task.task_type == TaskType::Remediation {
            if let Some(parent_id) = task.parent_id {
                match self.task_repo.get(parent_id).await? {
                    Some(parent) if !parent.status.is_terminal() => {}
                    _ => return Ok(false),
                }
            }
        }
        Ok(true)
    }

    /// Highest-priority ready tasks, in priority order, without reserving
    /// any WIP slot.
    pub async fn ready_queue(&self) -> Result<Vec<Task>, AutopilotError> {
        let candidates = self.task_repo.list(TaskFilter::default()).await?;
        let mut ready = Vec::new();
        for task in candidates {
            if self.is_ready(&task).await? {
                ready.push(task);
            }
        }
        let profile = self.profile.read().await;
        let mut refs: Vec<&Task> = ready.iter().collect();
        profile.sort_by_priority(&mut refs);
        let ordered: Vec<Task> = refs.into_iter().cloned().collect();
        Ok(ordered)
    }

    /// Pull and reserve the next ready task for `worker_id`, respecting the
    /// WIP Controller's caps. Returns `None` when nothing is ready or no
    /// capacity remains.
    pub async fn pull(&self, worker_id: &str) -> Result<Option<Task>, AutopilotError> {
        if !self.wip.can_accept(worker_id).await {
            return Ok(None);
        }
        for task in self.ready_queue().await? {
            if self.wip.reserve(task.id, worker_id).await {
                debug!(task_id = %task.id, worker_id, "task pulled and reserved");
                return Ok(Some(task));
            }
        }
        Ok(None)
    }

    /// Release `task_id`'s WIP slot (spec §4.7: release re-triggers
    /// readiness evaluation via the controller's notifier).
    pub async fn release(&self, task_id: Uuid) {
        self.wip.release(task_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::errors::StoreResult;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemoryTaskRepo {
        rows: Mutex<HashMap<Uuid, Task>>,
    }

    impl InMemoryTaskRepo {
        fn insert(&self, task: Task) {
            self.rows.lock().unwrap().insert(task.id, task);
        }
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
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|t| t.status == status)
                .cloned()
                .collect())
        }
        async fn get_dependents(&self, _task_id: Uuid) -> StoreResult<Vec<Task>> {
            Ok(vec![])
        }
    }

    fn scheduler(repo: Arc<InMemoryTaskRepo>) -> Scheduler<InMemoryTaskRepo> {
        Scheduler::new(repo, Arc::new(WipController::new(4, 1)))
    }

    #[tokio::test]
    async fn pending_task_with_no_deps_is_ready() {
        let repo = Arc::new(InMemoryTaskRepo::default());
        let task = Task::new("T", "d");
        repo.insert(task.clone());
        let sched = scheduler(repo);
        let ready = sched.ready_queue().await.unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, task.id);
    }

    #[tokio::test]
    async fn task_with_incomplete_dependency_is_not_ready() {
        let repo = Arc::new(InMemoryTaskRepo::default());
        let dep = Task::new("dep", "d");
        let mut task = Task::new("T", "d");
        task.dependencies.push(dep.id);
        repo.insert(dep);
        repo.insert(task);
        let sched = scheduler(repo);
        assert!(sched.ready_queue().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remediation_with_inactive_parent_is_not_ready() {
        let repo = Arc::new(InMemoryTaskRepo::default());
        let mut parent = Task::new("parent", "d");
        parent.status = TaskStatus::Done;
        let remediation = Task::new_remediation(&parent, "fix it");
        repo.insert(parent);
        repo.insert(remediation);
        let sched = scheduler(repo);
        assert!(sched.ready_queue().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pull_reserves_wip_slot() {
        let repo = Arc::new(InMemoryTaskRepo::default());
        let task = Task::new("T", "d");
        repo.insert(task.clone());
        let sched = scheduler(repo);
        let pulled = sched.pull("worker-1").await.unwrap().unwrap();
        assert_eq!(pulled.id, task.id);
        assert!(sched.pull("worker-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn needs_review_outranks_pending_in_queue_order() {
        let repo = Arc::new(InMemoryTaskRepo::default());
        let pending = Task::new("pending", "d");
        let mut needs_review = Task::new("needs_review", "d");
        needs_review.status = TaskStatus::NeedsReview;
        repo.insert(pending);
        repo.insert(needs_review.clone());
        let sched = scheduler(repo);
        let ready = sched.ready_queue().await.unwrap();
        assert_eq!(ready[0].id, needs_review.id);
    }
}
