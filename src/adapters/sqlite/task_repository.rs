//! SQLite implementation of the TaskRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::models::{Blocker, ComplexityFactors, Phase, PhaseAttempts, Task, TaskStatus, TaskType};
use crate::domain::ports::{StoreError, StoreResult, TaskFilter, TaskRepository};

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: &Task) -> StoreResult<()> {
        let complexity_json = serde_json::to_string(&task.complexity)?;
        let attempts_json = serde_json::to_string(&task.attempts)?;
        let blocker_json = match &task.blocker {
            Some(b) => Some(serde_json::to_string(b)?),
            None => None,
        };

        sqlx::query(
            r#"INSERT INTO tasks (id, title, description, task_type, status, parent_id,
               epic_id, milestone_id, complexity, current_phase, gate_required, attempts,
               assigned_agent_id, blocker, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(task.id.to_string())
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.task_type.as_str())
        .bind(task.status.as_str())
        .bind(task.parent_id.map(|id| id.to_string()))
        .bind(task.epic_id.map(|id| id.to_string()))
        .bind(task.milestone_id.map(|id| id.to_string()))
        .bind(&complexity_json)
        .bind(task.current_phase.as_str())
        .bind(task.gate_required)
        .bind(&attempts_json)
        .bind(task.assigned_agent_id.map(|id| id.to_string()))
        .bind(&blocker_json)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        for dep_id in &task.dependencies {
            self.add_dependency(task.id, *dep_id).await?;
        }

        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => {
                let mut task = r.try_into()?;
                self.load_dependencies(&mut task).await?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, task: &Task) -> StoreResult<()> {
        let complexity_json = serde_json::to_string(&task.complexity)?;
        let attempts_json = serde_json::to_string(&task.attempts)?;
        let blocker_json = match &task.blocker {
            Some(b) => Some(serde_json::to_string(b)?),
            None => None,
        };

        let result = sqlx::query(
            r#"UPDATE tasks SET title = ?, description = ?, task_type = ?, status = ?,
               parent_id = ?, epic_id = ?, milestone_id = ?, complexity = ?, current_phase = ?,
               gate_required = ?, attempts = ?, assigned_agent_id = ?, blocker = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.task_type.as_str())
        .bind(task.status.as_str())
        .bind(task.parent_id.map(|id| id.to_string()))
        .bind(task.epic_id.map(|id| id.to_string()))
        .bind(task.milestone_id.map(|id| id.to_string()))
        .bind(&complexity_json)
        .bind(task.current_phase.as_str())
        .bind(task.gate_required)
        .bind(&attempts_json)
        .bind(task.assigned_agent_id.map(|id| id.to_string()))
        .bind(&blocker_json)
        .bind(task.updated_at.to_rfc3339())
        .bind(task.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::TaskNotFound(task.id));
        }

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::TaskNotFound(id));
        }

        Ok(())
    }

    async fn list(&self, filter: TaskFilter) -> StoreResult<Vec<Task>> {
        let mut query = String::from("SELECT * FROM tasks WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(status) = &filter.status {
            query.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }
        if let Some(task_type) = &filter.task_type {
            query.push_str(" AND task_type = ?");
            bindings.push(task_type.as_str().to_string());
        }
        if let Some(epic_id) = &filter.epic_id {
            query.push_str(" AND epic_id = ?");
            bindings.push(epic_id.to_string());
        }
        if let Some(milestone_id) = &filter.milestone_id {
            query.push_str(" AND milestone_id = ?");
            bindings.push(milestone_id.to_string());
        }
        if let Some(parent_id) = &filter.parent_id {
            query.push_str(" AND parent_id = ?");
            bindings.push(parent_id.to_string());
        }

        query.push_str(" ORDER BY created_at ASC");

        let mut q = sqlx::query_as::<_, TaskRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows: Vec<TaskRow> = q.fetch_all(&self.pool).await?;
        let mut tasks = Vec::new();
        for row in rows {
            let mut task: Task = row.try_into()?;
            self.load_dependencies(&mut task).await?;
            tasks.push(task);
        }
        Ok(tasks)
    }

    async fn load_roadmap(&self) -> StoreResult<Vec<Task>> {
        self.list(TaskFilter::default()).await
    }

    async fn list_by_status(&self, status: TaskStatus) -> StoreResult<Vec<Task>> {
        self.list(TaskFilter {
            status: Some(status),
            ..Default::default()
        })
        .await
    }

    async fn get_dependents(&self, task_id: Uuid) -> StoreResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            r#"SELECT t.* FROM tasks t
               INNER JOIN task_dependencies d ON t.id = d.task_id
               WHERE d.depends_on_id = ?
               ORDER BY t.created_at ASC"#,
        )
        .bind(task_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut tasks = Vec::new();
        for row in rows {
            let mut task: Task = row.try_into()?;
            self.load_dependencies(&mut task).await?;
            tasks.push(task);
        }
        Ok(tasks)
    }
}

impl SqliteTaskRepository {
    async fn add_dependency(&self, task_id: Uuid, depends_on: Uuid) -> StoreResult<()> {
        sqlx::query("INSERT OR IGNORE INTO task_dependencies (task_id, depends_on_id) VALUES (?, ?)")
            .bind(task_id.to_string())
            .bind(depends_on.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn load_dependencies(&self, task: &mut Task) -> StoreResult<()> {
        let deps: Vec<(String,)> = sqlx::query_as("SELECT depends_on_id FROM task_dependencies WHERE task_id = ?")
            .bind(task.id.to_string())
            .fetch_all(&self.pool)
            .await?;

        task.dependencies = deps.into_iter().filter_map(|(id,)| Uuid::parse_str(&id).ok()).collect();

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    title: String,
    description: String,
    task_type: String,
    status: String,
    parent_id: Option<String>,
    epic_id: Option<String>,
    milestone_id: Option<String>,
    complexity: String,
    current_phase: String,
    gate_required: bool,
    attempts: String,
    assigned_agent_id: Option<String>,
    blocker: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<TaskRow> for Task {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let id = super::parse_uuid(&row.id)?;
        let parent_id = super::parse_optional_uuid(row.parent_id)?;
        let epic_id = super::parse_optional_uuid(row.epic_id)?;
        let milestone_id = super::parse_optional_uuid(row.milestone_id)?;
        let assigned_agent_id = super::parse_optional_uuid(row.assigned_agent_id)?;

        let status = TaskStatus::from_str(&row.status)
            .ok_or_else(|| StoreError::ConstraintViolation(format!("invalid status: {}", row.status)))?;
        let task_type = TaskType::from_str(&row.task_type)
            .ok_or_else(|| StoreError::ConstraintViolation(format!("invalid task_type: {}", row.task_type)))?;
        let current_phase = Phase::from_str(&row.current_phase)
            .ok_or_else(|| StoreError::ConstraintViolation(format!("invalid phase: {}", row.current_phase)))?;

        let complexity: ComplexityFactors = serde_json::from_str(&row.complexity)?;
        let attempts: HashMap<Phase, PhaseAttempts> = serde_json::from_str(&row.attempts)?;
        let blocker: Option<Blocker> = match row.blocker {
            Some(ref json) => Some(serde_json::from_str(json)?),
            None => None,
        };

        let created_at = super::parse_datetime(&row.created_at)?;
        let updated_at = super::parse_datetime(&row.updated_at)?;

        Ok(Task {
            id,
            title: row.title,
            description: row.description,
            task_type,
            status,
            parent_id,
            epic_id,
            milestone_id,
            dependencies: Vec::new(), // loaded separately
            complexity,
            created_at,
            updated_at,
            current_phase,
            gate_required: row.gate_required,
            attempts,
            assigned_agent_id,
            blocker,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn setup_test_repo() -> SqliteTaskRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteTaskRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_get_task() {
        let repo = setup_test_repo().await;
        let task = Task::new("Test Task", "Description");

        repo.create(&task).await.unwrap();

        let retrieved = repo.get(task.id).await.unwrap();
        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap().title, "Test Task");
    }

    #[tokio::test]
    async fn test_task_dependencies() {
        let repo = setup_test_repo().await;

        let dep_task = Task::new("Dependency", "Desc");
        let mut main_task = Task::new("Main", "Desc");
        main_task.dependencies.push(dep_task.id);

        repo.create(&dep_task).await.unwrap();
        repo.create(&main_task).await.unwrap();

        let retrieved = repo.get(main_task.id).await.unwrap().unwrap();
        assert!(retrieved.dependencies.contains(&dep_task.id));

        let dependents = repo.get_dependents(dep_task.id).await.unwrap();
        assert_eq!(dependents.len(), 1);
        assert_eq!(dependents[0].id, main_task.id);
    }

    #[tokio::test]
    async fn test_update_persists_status_and_phase() {
        let repo = setup_test_repo().await;
        let mut task = Task::new("Advance me", "Desc");
        repo.create(&task).await.unwrap();

        task.status = TaskStatus::InProgress;
        task.current_phase = Phase::Spec;
        task.record_attempt(Phase::Strategize, false);
        repo.update(&task).await.unwrap();

        let retrieved = repo.get(task.id).await.unwrap().unwrap();
        assert_eq!(retrieved.status, TaskStatus::InProgress);
        assert_eq!(retrieved.current_phase, Phase::Spec);
        assert_eq!(retrieved.attempts_for(Phase::Strategize).counted, 1);
    }

    #[tokio::test]
    async fn test_update_missing_task_errors() {
        let repo = setup_test_repo().await;
        let task = Task::new("Ghost", "Desc");
        let err = repo.update(&task).await.unwrap_err();
        assert!(matches!(err, StoreError::TaskNotFound(id) if id == task.id));
    }

    #[tokio::test]
    async fn test_list_by_status() {
        let repo = setup_test_repo().await;

        let mut running = Task::new("Running", "Desc");
        running.status = TaskStatus::InProgress;
        repo.create(&running).await.unwrap();

        let pending = Task::new("Pending", "Desc");
        repo.create(&pending).await.unwrap();

        let in_progress = repo.list_by_status(TaskStatus::InProgress).await.unwrap();
        assert_eq!(in_progress.len(), 1);
        assert_eq!(in_progress[0].title, "Running");
    }

    #[tokio::test]
    async fn test_blocker_round_trips() {
        let repo = setup_test_repo().await;
        let mut task = Task::new("Blocked task", "Desc");
        task.status = TaskStatus::InProgress;
        repo.create(&task).await.unwrap();

        task.block(None, "provider cooldown exceeds threshold");
        repo.update(&task).await.unwrap();

        let retrieved = repo.get(task.id).await.unwrap().unwrap();
        assert!(retrieved.is_blocked());
        assert_eq!(
            retrieved.blocker.unwrap().reason,
            "provider cooldown exceeds threshold"
        );
    }
}
