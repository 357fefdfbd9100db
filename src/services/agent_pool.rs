//! Agent Pool (C4) — claims, releases, and cools down provider/model slots.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::AutopilotError;
use crate::domain::models::agent::{Agent, AgentTier, UsageSample};
use crate::domain::ports::AgentRepository;

/// Default rolling usage window size, matching §4.9's 50-sample default.
pub const DEFAULT_USAGE_WINDOW: usize = 50;

/// Duration an agent spends in cooldown after a rate-limit response, before
/// escalating to the longer repeated-failure cooldown.
const RATE_LIMIT_COOLDOWN: chrono::Duration = chrono::Duration::seconds(60);
const CONTEXT_LIMIT_COOLDOWN: chrono::Duration = chrono::Duration::seconds(30);

/// Runtime pool of claimable agents, backed by `AgentRepository` for
/// restart recovery.
pub struct AgentPool {
    repo: Arc<dyn AgentRepository>,
    agents: RwLock<HashMap<Uuid, Agent>>,
}

impl AgentPool {
    pub async fn load(repo: Arc<dyn AgentRepository>) -> Result<Self, AutopilotError> {
        let existing = repo.list(Default::default()).await?;
        let mut agents = HashMap::new();
        for agent in existing {
            agents.insert(agent.id, agent);
        }
        Ok(Self {
            repo,
            agents: RwLock::new(agents),
        })
    }

    pub async fn register(&self, provider: impl Into<String>, model: impl Into<String>, tier: AgentTier) -> Result<Uuid, AutopilotError> {
        let agent = Agent::new(provider, model, tier).with_usage_window(DEFAULT_USAGE_WINDOW);
        let id = agent.id;
        self.repo.upsert(&agent).await?;
        self.agents.write().await.insert(id, agent);
        Ok(id)
    }

    /// All agents currently known to the pool, regardless of availability —
    /// used by the Model Router's candidate ranking.
    pub async fn snapshot(&self) -> Vec<Agent> {
        self.agents.read().await.values().cloned().collect()
    }

    pub async fn claim(&self, agent_id: Uuid, task_id: Uuid) -> Result<(), AutopilotError> {
        let mut agents = self.agents.write().await;
        let agent = agents
            .get_mut(&agent_id)
            .ok_or(AutopilotError::AgentNotFound(agent_id))?;
        if !agent.is_available(Utc::now()) {
            return Err(AutopilotError::Integrity(format!(
                "agent {agent_id} claimed while unavailable"
            )));
        }
        agent.claim(task_id);
        self.repo.upsert(agent).await?;
        Ok(())
    }

    pub async fn release(&self, agent_id: Uuid, sample: UsageSample) -> Result<(), AutopilotError> {
        let mut agents = self.agents.write().await;
        let agent = agents
            .get_mut(&agent_id)
            .ok_or(AutopilotError::AgentNotFound(agent_id))?;
        agent.record_usage(sample);
        agent.release();
        self.repo.upsert(agent).await?;
        Ok(())
    }

    /// `retry_after_s` is the provider's own `Retry-After` value, when the
    /// 429 carried one; the agent cools down for whichever of that and our
    /// own baseline is longer, so a provider asking for more than our
    /// default never gets claimed again too early.
    pub async fn report_rate_limit(&self, agent_id: Uuid, retry_after_s: Option<u32>) -> Result<(), AutopilotError> {
        self.cool_down(agent_id, RATE_LIMIT_COOLDOWN, retry_after_s, "rate limit").await
    }

    pub async fn report_context_limit(&self, agent_id: Uuid, retry_after_s: Option<u32>) -> Result<(), AutopilotError> {
        self.cool_down(agent_id, CONTEXT_LIMIT_COOLDOWN, retry_after_s, "context limit").await
    }

    async fn cool_down(
        &self,
        agent_id: Uuid,
        baseline: chrono::Duration,
        retry_after_s: Option<u32>,
        reason: &str,
    ) -> Result<(), AutopilotError> {
        let provider_value = retry_after_s.map(|s| chrono::Duration::seconds(s as i64));
        let duration = provider_value.map_or(baseline, |p| p.max(baseline));

        let mut agents = self.agents.write().await;
        let agent = agents
            .get_mut(&agent_id)
            .ok_or(AutopilotError::AgentNotFound(agent_id))?;
        agent.enter_cooldown(Utc::now(), duration);
        self.repo.upsert(agent).await?;
        tracing::info!(%agent_id, reason, seconds = duration.num_seconds(), "agent entering cooldown");
        Ok(())
    }

    /// Promote a worker to coordinate sub-agents (spec §4.4): re-tag its
    /// tier without otherwise disturbing its usage history.
    pub async fn promote_coordinator(&self, agent_id: Uuid) -> Result<(), AutopilotError> {
        self.retag(agent_id, AgentTier::Architect).await
    }

    pub async fn demote_coordinator(&self, agent_id: Uuid) -> Result<(), AutopilotError> {
        self.retag(agent_id, AgentTier::Worker).await
    }

    async fn retag(&self, agent_id: Uuid, tier: AgentTier) -> Result<(), AutopilotError> {
        let mut agents = self.agents.write().await;
        let agent = agents
            .get_mut(&agent_id)
            .ok_or(AutopilotError::AgentNotFound(agent_id))?;
        agent.tier = tier;
        self.repo.upsert(agent).await?;
        Ok(())
    }

    /// Fraction of the pool currently busy or in cooldown, for the
    /// Operations Manager's balance heuristic (spec §4.9).
    pub async fn usage_ratio(&self, now: DateTime<Utc>) -> f64 {
        let agents = self.agents.read().await;
        if agents.is_empty() {
            return 0.0;
        }
        let unavailable = agents.values().filter(|a| !a.is_available(now)).count();
        unavailable as f64 / agents.len() as f64
    }

    pub async fn available(&self, model: &str, now: DateTime<Utc>) -> Vec<Agent> {
        self.agents
            .read()
            .await
            .values()
            .filter(|a| a.model == model && a.is_available(now))
            .cloned()
            .collect()
    }
}
