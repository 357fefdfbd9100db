//! SQLite implementation of the AgentRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::models::{Agent, AgentStatus, AgentTier};
use crate::domain::ports::{AgentFilter, AgentRepository, StoreError, StoreResult};

#[derive(Clone)]
pub struct SqliteAgentRepository {
    pool: SqlitePool,
}

impl SqliteAgentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentRepository for SqliteAgentRepository {
    async fn upsert(&self, agent: &Agent) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO agents (id, provider, model, tier, status, current_task_id,
               cooldown_until, consecutive_failures, usage_window_capacity)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   provider = excluded.provider,
                   model = excluded.model,
                   tier = excluded.tier,
                   status = excluded.status,
                   current_task_id = excluded.current_task_id,
                   cooldown_until = excluded.cooldown_until,
                   consecutive_failures = excluded.consecutive_failures,
                   usage_window_capacity = excluded.usage_window_capacity"#,
        )
        .bind(agent.id.to_string())
        .bind(&agent.provider)
        .bind(&agent.model)
        .bind(agent.tier.as_str())
        .bind(agent.status.as_str())
        .bind(agent.current_task_id.map(|id| id.to_string()))
        .bind(agent.cooldown_until.map(|t| t.to_rfc3339()))
        .bind(agent.consecutive_failures as i32)
        .bind(agent.usage_sample_count() as i32)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.try_into()).transpose()
    }

    async fn list(&self, filter: AgentFilter) -> StoreResult<Vec<Agent>> {
        let mut sql = String::from("SELECT * FROM agents WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(tier) = &filter.tier {
            sql.push_str(" AND tier = ?");
            bindings.push(tier.as_str().to_string());
        }
        if let Some(status) = &filter.status {
            sql.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }

        let mut q = sqlx::query_as::<_, AgentRow>(&sql);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows: Vec<AgentRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM agents WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AgentNotFound(id));
        }

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: String,
    provider: String,
    model: String,
    tier: String,
    status: String,
    current_task_id: Option<String>,
    cooldown_until: Option<String>,
    consecutive_failures: i32,
    usage_window_capacity: i32,
}

impl TryFrom<AgentRow> for Agent {
    type Error = StoreError;

    fn try_from(row: AgentRow) -> Result<Self, Self::Error> {
        let id = super::parse_uuid(&row.id)?;
        let current_task_id = super::parse_optional_uuid(row.current_task_id)?;
        let cooldown_until = super::parse_optional_datetime(row.cooldown_until)?;

        let tier = AgentTier::parse_str(&row.tier)
            .ok_or_else(|| StoreError::ConstraintViolation(format!("invalid tier: {}", row.tier)))?;
        let status = match row.status.as_str() {
            "idle" => AgentStatus::Idle,
            "busy" => AgentStatus::Busy,
            "cooldown" => AgentStatus::Cooldown,
            "disabled" => AgentStatus::Disabled,
            other => return Err(StoreError::ConstraintViolation(format!("invalid agent status: {other}"))),
        };

        let mut agent =
            Agent::new(row.provider, row.model, tier).with_usage_window(row.usage_window_capacity.max(1) as usize);
        agent.id = id;
        agent.status = status;
        agent.current_task_id = current_task_id;
        agent.cooldown_until = cooldown_until;
        agent.consecutive_failures = row.consecutive_failures as u32;

        Ok(agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn setup_test_repo() -> SqliteAgentRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteAgentRepository::new(pool)
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let repo = setup_test_repo().await;
        let agent = Agent::new("anthropic", "claude-sonnet", AgentTier::Specialist);

        repo.upsert(&agent).await.unwrap();

        let retrieved = repo.get(agent.id).await.unwrap().unwrap();
        assert_eq!(retrieved.provider, "anthropic");
        assert_eq!(retrieved.model, "claude-sonnet");
        assert_eq!(retrieved.tier, AgentTier::Specialist);
        assert_eq!(retrieved.status, AgentStatus::Idle);
    }

    #[tokio::test]
    async fn test_upsert_updates_existing_row() {
        let repo = setup_test_repo().await;
        let mut agent = Agent::new("anthropic", "claude-haiku", AgentTier::Worker);
        repo.upsert(&agent).await.unwrap();

        let task_id = Uuid::new_v4();
        agent.claim(task_id);
        repo.upsert(&agent).await.unwrap();

        let retrieved = repo.get(agent.id).await.unwrap().unwrap();
        assert_eq!(retrieved.status, AgentStatus::Busy);
        assert_eq!(retrieved.current_task_id, Some(task_id));
    }

    #[tokio::test]
    async fn test_list_by_tier_and_status() {
        let repo = setup_test_repo().await;

        let worker = Agent::new("anthropic", "claude-haiku", AgentTier::Worker);
        let mut architect = Agent::new("anthropic", "claude-opus", AgentTier::Architect);
        architect.enter_cooldown(chrono::Utc::now(), chrono::Duration::seconds(60));

        repo.upsert(&worker).await.unwrap();
        repo.upsert(&architect).await.unwrap();

        let workers = repo.list(AgentFilter { tier: Some(AgentTier::Worker), ..Default::default() }).await.unwrap();
        assert_eq!(workers.len(), 1);

        let cooling = repo
            .list(AgentFilter { status: Some(AgentStatus::Cooldown), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(cooling.len(), 1);
        assert_eq!(cooling[0].id, architect.id);
    }

    #[tokio::test]
    async fn test_delete_missing_agent_errors() {
        let repo = setup_test_repo().await;
        let err = repo.delete(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::AgentNotFound(_)));
    }
}
