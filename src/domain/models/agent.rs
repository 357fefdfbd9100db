//! Agent domain model — a provider/model slot managed by the Agent Pool (C4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Role an agent plays when claimed for a task (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentTier {
    Architect,
    Specialist,
    Worker,
}

impl Default for AgentTier {
    fn default() -> Self {
        Self::Worker
    }
}

impl AgentTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Architect => "architect",
            Self::Specialist => "specialist",
            Self::Worker => "worker",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "architect" => Some(Self::Architect),
            "specialist" => Some(Self::Specialist),
            "worker" => Some(Self::Worker),
            _ => None,
        }
    }
}

/// Current availability of an agent slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Busy,
    /// In cooldown after a provider rate limit or repeated failure; not
    /// eligible for claim until `cooldown_until` elapses.
    Cooldown,
    /// Administratively disabled; never claimed.
    Disabled,
}

impl Default for AgentStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Cooldown => "cooldown",
            Self::Disabled => "disabled",
        }
    }
}

/// Outcome of a single dispatched call, kept in a bounded rolling window so
/// the Agent Pool and Model Router can compute recent success rate and
/// latency without an unbounded history (spec §4.3 step 3, §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSample {
    pub at: DateTime<Utc>,
    pub success: bool,
    pub latency_ms: u64,
    pub cost_usd: f64,
}

/// A claimable provider/model slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub provider: String,
    pub model: String,
    pub tier: AgentTier,
    pub status: AgentStatus,
    pub current_task_id: Option<Uuid>,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    #[serde(skip)]
    usage_window: VecDeque<UsageSample>,
    usage_window_capacity: usize,
}

impl Agent {
    pub fn new(provider: impl Into<String>, model: impl Into<String>, tier: AgentTier) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider: provider.into(),
            model: model.into(),
            tier,
            status: AgentStatus::Idle,
            current_task_id: None,
            cooldown_until: None,
            consecutive_failures: 0,
            usage_window: VecDeque::new(),
            usage_window_capacity: 50,
        }
    }

    pub fn with_usage_window(mut self, capacity: usize) -> Self {
        self.usage_window_capacity = capacity.max(1);
        self
    }

    /// Whether this agent can be claimed right now.
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            AgentStatus::Idle => true,
            AgentStatus::Cooldown => self.cooldown_until.map_or(true, |until| now >= until),
            AgentStatus::Busy | AgentStatus::Disabled => false,
        }
    }

    pub fn claim(&mut self, task_id: Uuid) {
        self.status = AgentStatus::Busy;
        self.current_task_id = Some(task_id);
    }

    pub fn release(&mut self) {
        self.status = AgentStatus::Idle;
        self.current_task_id = None;
    }

    /// Enter cooldown for `duration` (spec §4.4: rate-limit or repeated
    /// provider failure response).
    pub fn enter_cooldown(&mut self, now: DateTime<Utc>, duration: chrono::Duration) {
        self.status = AgentStatus::Cooldown;
        self.cooldown_until = Some(now + duration);
        self.current_task_id = None;
    }

    pub fn record_usage(&mut self, sample: UsageSample) {
        if sample.success {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
        }
        self.usage_window.push_back(sample);
        while self.usage_window.len() > self.usage_window_capacity {
            self.usage_window.pop_front();
        }
    }

    /// Recent success rate over the usage window, `1.0` when no samples yet
    /// (an untested agent is not penalized).
    pub fn success_rate(&self) -> f64 {
        if self.usage_window.is_empty() {
            return 1.0;
        }
        let successes = self.usage_window.iter().filter(|s| s.success).count();
        successes as f64 / self.usage_window.len() as f64
    }

    pub fn mean_latency_ms(&self) -> f64 {
        if self.usage_window.is_empty() {
            return 0.0;
        }
        let total: u64 = self.usage_window.iter().map(|s| s.latency_ms).sum();
        total as f64 / self.usage_window.len() as f64
    }

    pub fn rolling_cost_usd(&self) -> f64 {
        self.usage_window.iter().map(|s| s.cost_usd).sum()
    }

    pub fn usage_sample_count(&self) -> usize {
        self.usage_window.len()
    }

    pub fn usage_ratio(&self) -> f64 {
        self.usage_window.len() as f64 / self.usage_window_capacity as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(success: bool) -> UsageSample {
        UsageSample {
            at: Utc::now(),
            success,
            latency_ms: 100,
            cost_usd: 0.01,
        }
    }

    #[test]
    fn new_agent_is_idle_and_available() {
        let agent = Agent::new("anthropic", "claude-haiku", AgentTier::Worker);
        assert_eq!(agent.status, AgentStatus::Idle);
        assert!(agent.is_available(Utc::now()));
    }

    #[test]
    fn claim_and_release_round_trip() {
        let mut agent = Agent::new("anthropic", "claude-sonnet", AgentTier::Specialist);
        let task_id = Uuid::new_v4();
        agent.claim(task_id);
        assert_eq!(agent.status, AgentStatus::Busy);
        assert!(!agent.is_available(Utc::now()));
        agent.release();
        assert_eq!(agent.status, AgentStatus::Idle);
        assert!(agent.current_task_id.is_none());
    }

    #[test]
    fn cooldown_blocks_until_elapsed() {
        let mut agent = Agent::new("anthropic", "claude-opus", AgentTier::Architect);
        let now = Utc::now();
        agent.enter_cooldown(now, chrono::Duration::seconds(60));
        assert!(!agent.is_available(now + chrono::Duration::seconds(30)));
        assert!(agent.is_available(now + chrono::Duration::seconds(61)));
    }

    #[test]
    fn success_rate_defaults_to_one_with_no_samples() {
        let agent = Agent::new("anthropic", "claude-haiku", AgentTier::Worker);
        assert_eq!(agent.success_rate(), 1.0);
    }

    #[test]
    fn usage_window_is_bounded_and_tracks_failures() {
        let mut agent = Agent::new("anthropic", "claude-haiku", AgentTier::Worker).with_usage_window(3);
        agent.record_usage(sample(true));
        agent.record_usage(sample(false));
        agent.record_usage(sample(false));
        agent.record_usage(sample(false));
        assert_eq!(agent.consecutive_failures, 3);
        assert!(agent.success_rate() < 1.0);
        // window capped at 3 samples even though 4 were recorded
        assert_eq!(agent.usage_ratio(), 1.0);
    }
}
