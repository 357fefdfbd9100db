//! Model Router (C3) — task-complexity-aware model selection.
//!
//! Scores a task's complexity, maps the score to a tier, and picks the
//! cheapest model tier that both covers the tier and has at least one
//! eligible (non-cooldown) candidate agent. Escalates tiers on retry and
//! when every candidate for a tier is unavailable, failing with
//! `NoEligibleModel` once the escalation budget is exhausted (spec §4.3).

use chrono::{DateTime, Utc};

use crate::domain::errors::AutopilotError;
use crate::domain::models::agent::AgentTier;
use crate::domain::models::config::ModelRoutingSettings;
use crate::domain::models::task::{ComplexityTier, Task};
use crate::domain::models::{Agent, ModelSelection};

/// Model router for selecting cost-effective models per task.
#[derive(Debug, Clone)]
pub struct ModelRouter {
    config: ModelRoutingSettings,
}

impl ModelRouter {
    pub fn new(config: ModelRoutingSettings) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ModelRoutingSettings::default())
    }

    fn model_for_tier(&self, tier: ComplexityTier) -> &str {
        match tier {
            ComplexityTier::Simple => &self.config.simple_model,
            ComplexityTier::Moderate => &self.config.moderate_model,
            ComplexityTier::Complex => &self.config.complex_model,
            ComplexityTier::Critical => &self.config.critical_model,
        }
    }

    /// Select a model for `task`, given the agents currently eligible to
    /// serve it (already filtered to the right provider/substrate by the
    /// caller). Escalates tier on retry and on provider unavailability, up
    /// to `config.max_escalations` steps, before failing.
    pub fn select_model(
        &self,
        task: &Task,
        agent_tier: AgentTier,
        candidates: &[Agent],
        now: DateTime<Utc>,
    ) -> Result<ModelSelection, AutopilotError> {
        let score = task.complexity.score(task.current_phase);
        let mut tier = ComplexityTier::from_score(score);

        if self.config.architect_always_complex
            && agent_tier == AgentTier::Architect
            && tier < ComplexityTier::Complex
        {
            tier = ComplexityTier::Complex;
        }

        let retry_attempt = task.attempts_for(task.current_phase).counted;
        let mut escalated = false;
        for _ in 0..retry_attempt {
            let next = tier.escalate();
            if next != tier {
                tier = next;
                escalated = true;
            }
        }

        if !self.config.enabled {
            return Ok(ModelSelection {
                task_id: task.id,
                agent_tier,
                complexity_score: score,
                complexity_tier: tier,
                model: self.config.critical_model.clone(),
                retry_attempt,
                escalated: false,
                candidates_considered: candidates.len() as u32,
                cost_usd_estimate: 0.0,
                decided_at: now,
            });
        }

        let mut escalations_used = 0;
        loop {
            let model = self.model_for_tier(tier).to_string();
            let eligible: Vec<&Agent> = candidates
                .iter()
                .filter(|a| a.model == model && a.is_available(now))
                .collect();

            if !eligible.is_empty() {
                let best = rank(&eligible);
                return Ok(ModelSelection {
                    task_id: task.id,
                    agent_tier,
                    complexity_score: score,
                    complexity_tier: tier,
                    model,
                    retry_attempt,
                    escalated,
                    candidates_considered: eligible.len() as u32,
                    cost_usd_estimate: best.rolling_cost_usd() / (best.usage_sample_count().max(1) as f64),
                    decided_at: now,
                });
            }

            if escalations_used >= self.config.max_escalations || tier == ComplexityTier::Critical {
                return Err(AutopilotError::NoEligibleModel {
                    tier: format!("{tier:?}"),
                });
            }
            tier = tier.escalate();
            escalated = true;
            escalations_used += 1;
        }
    }
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Rank candidates by recent success rate (desc), then mean latency (asc),
/// then rolling cost (asc); return the winner.
fn rank<'a>(candidates: &[&'a Agent]) -> &'a Agent {
    candidates
        .iter()
        .copied()
        .max_by(|a, b| {
            a.success_rate()
                .partial_cmp(&b.success_rate())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.mean_latency_ms().partial_cmp(&a.mean_latency_ms()).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| b.rolling_cost_usd().partial_cmp(&a.rolling_cost_usd()).unwrap_or(std::cmp::Ordering::Equal))
        })
        .expect("candidates is non-empty")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::agent::AgentTier as AgentTierModel;
    use crate::domain::models::task::ComplexityFactors;

    fn task_with_score(score_inputs: ComplexityFactors) -> Task {
        let mut task = Task::new("T", "d");
        task.complexity = score_inputs;
        task
    }

    fn agent_for(model: &str) -> Agent {
        Agent::new("anthropic", model, AgentTierModel::Worker)
    }

    #[test]
    fn simple_task_routes_to_simple_model() {
        let router = ModelRouter::with_defaults();
        let task = task_with_score(ComplexityFactors::default());
        let candidates = vec![agent_for(&router.config.simple_model)];
        let selection = router
            .select_model(&task, AgentTier::Worker, &candidates, Utc::now())
            .unwrap();
        assert_eq!(selection.model, router.config.simple_model);
        assert!(!selection.escalated);
    }

    #[test]
    fn retry_escalates_tier() {
        let router = ModelRouter::with_defaults();
        let mut task = task_with_score(ComplexityFactors::default());
        task.record_attempt(task.current_phase, false);
        let candidates = vec![
            agent_for(&router.config.simple_model),
            agent_for(&router.config.moderate_model),
        ];
        let selection = router
            .select_model(&task, AgentTier::Worker, &candidates, Utc::now())
            .unwrap();
        assert!(selection.escalated);
        assert_eq!(selection.model, router.config.moderate_model);
    }

    #[test]
    fn architect_always_gets_at_least_complex() {
        let router = ModelRouter::with_defaults();
        let task = task_with_score(ComplexityFactors::default());
        let candidates = vec![agent_for(&router.config.complex_model)];
        let selection = router
            .select_model(&task, AgentTier::Architect, &candidates, Utc::now())
            .unwrap();
        assert_eq!(selection.model, router.config.complex_model);
    }

    #[test]
    fn no_candidates_anywhere_yields_no_eligible_model() {
        let router = ModelRouter::with_defaults();
        let task = task_with_score(ComplexityFactors::default());
        let result = router.select_model(&task, AgentTier::Worker, &[], Utc::now());
        assert!(matches!(result, Err(AutopilotError::NoEligibleModel { .. })));
    }

    #[test]
    fn unavailable_tier_escalates_to_next_with_capacity() {
        let router = ModelRouter::with_defaults();
        let task = task_with_score(ComplexityFactors::default());
        let mut busy = agent_for(&router.config.simple_model);
        busy.claim(uuid::Uuid::new_v4());
        let candidates = vec![busy, agent_for(&router.config.moderate_model)];
        let selection = router
            .select_model(&task, AgentTier::Worker, &candidates, Utc::now())
            .unwrap();
        assert_eq!(selection.model, router.config.moderate_model);
        assert!(selection.escalated);
    }
}
