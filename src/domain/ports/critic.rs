//! Critic contract (C5) — cost-tiered, phase-scoped quality checks that feed
//! the Quality Gate (C8).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::AutopilotError;
use crate::domain::models::{EvidenceBundle, Phase};

/// Relative expense of invoking a critic, used to order phased execution so
/// cheap critics short-circuit before expensive ones run (spec §4.5 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticCost {
    Cheap,
    Moderate,
    Expensive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Blocking,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub category: String,
    pub message: String,
    pub fix_suggestion: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pass,
    Warn,
    Fail,
}

/// A critic's verdict on one task/phase's evidence bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub status: ReportStatus,
    pub findings: Vec<Finding>,
    /// The exit criteria this critic evaluated, quoted back so the audit
    /// trail explains *why* a phase was judged to pass or fail.
    pub exit_criteria: String,
}

impl Report {
    pub fn pass(exit_criteria: impl Into<String>) -> Self {
        Self {
            status: ReportStatus::Pass,
            findings: Vec::new(),
            exit_criteria: exit_criteria.into(),
        }
    }

    pub fn has_blocking_findings(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Blocking)
    }
}

/// One quality check. A critic declares which phases it applies to and
/// whether its failure blocks phase advancement outright (`authority`) or
/// only contributes a warning signal.
#[async_trait]
pub trait Critic: Send + Sync {
    fn name(&self) -> &str;

    fn cost(&self) -> CriticCost;

    fn applicable_phases(&self) -> &[Phase];

    /// Whether a `Fail` status from this critic blocks phase advancement
    /// outright, versus only contributing to the peer-review consensus.
    fn is_authoritative(&self) -> bool;

    /// Whether two runs against identical evidence always produce the same
    /// report — used to decide whether this critic's `Fail` counts toward
    /// the bypass-detection corroboration threshold (spec §4.8).
    fn is_deterministic(&self) -> bool;

    async fn measure(&self, evidence: &EvidenceBundle) -> Result<Report, AutopilotError>;
}
