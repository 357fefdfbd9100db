//! Agent repository port — persistence for Agent Pool (C4) slot state so
//! cooldowns and usage history survive a Supervisor restart.

use async_trait::async_trait;
use uuid::Uuid;

use super::errors::StoreResult;
use crate::domain::models::{Agent, AgentStatus, AgentTier};

#[derive(Debug, Clone, Default)]
pub struct AgentFilter {
    pub tier: Option<AgentTier>,
    pub status: Option<AgentStatus>,
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn upsert(&self, agent: &Agent) -> StoreResult<()>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Agent>>;

    async fn list(&self, filter: AgentFilter) -> StoreResult<Vec<Agent>>;

    async fn delete(&self, id: Uuid) -> StoreResult<()>;
}
