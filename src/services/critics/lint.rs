//! Lint critic — parses a phase's linter log evidence (e.g. `clippy`).
//!
//! Non-authoritative by default: lint warnings are recorded but don't veto a
//! phase transition on their own (spec §4.5 names linter alongside the
//! blocking structural/test critics without marking it authoritative).

use async_trait::async_trait;

use crate::domain::errors::AutopilotError;
use crate::domain::models::{EvidenceBundle, Phase};
use crate::domain::ports::critic::{Critic, CriticCost, Finding, Report, ReportStatus, Severity};
use crate::domain::ports::EvidenceStore;

const ARTIFACT_NAME: &str = "lint.log";
const APPLICABLE: [Phase; 1] = [Phase::Implement];

pub struct LintCritic {
    store: std::sync::Arc<dyn EvidenceStore>,
    /// Warning count above which the critic downgrades to `Fail` rather
    /// than `Warn`.
    fail_threshold: u32,
}

impl LintCritic {
    pub fn new(store: std::sync::Arc<dyn EvidenceStore>) -> Self {
        Self {
            store,
            fail_threshold: 25,
        }
    }

    fn parse_warnings(log: &str) -> Vec<String> {
        log.lines()
            .map(str::trim)
            .filter(|line| line.starts_with("warning:") || line.starts_with("warning["))
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl Critic for LintCritic {
    fn name(&self) -> &str {
        "lint"
    }

    fn cost(&self) -> CriticCost {
        CriticCost::Cheap
    }

    fn applicable_phases(&self) -> &[Phase] {
        &APPLICABLE
    }

    fn is_authoritative(&self) -> bool {
        false
    }

    fn is_deterministic(&self) -> bool {
        true
    }

    async fn measure(&self, evidence: &EvidenceBundle) -> Result<Report, AutopilotError> {
        let Some(artifact) = evidence.find(ARTIFACT_NAME) else {
            return Ok(Report::pass("lint log optional; none produced"));
        };
        let content = self
            .store
            .read_artifact(artifact.task_id, artifact.phase, ARTIFACT_NAME)
            .await?;
        let log = String::from_utf8_lossy(&content);
        let warnings = Self::parse_warnings(&log);

        if warnings.is_empty() {
            return Ok(Report::pass("no lint warnings"));
        }

        let status = if warnings.len() as u32 >= self.fail_threshold {
            ReportStatus::Fail
        } else {
            ReportStatus::Warn
        };
        let severity = if status == ReportStatus::Fail {
            Severity::Blocking
        } else {
            Severity::Warning
        };

        Ok(Report {
            status,
            findings: warnings
                .into_iter()
                .take(10)
                .map(|message| Finding {
                    severity,
                    category: "lint".into(),
                    message,
                    fix_suggestion: None,
                })
                .collect(),
            exit_criteria: format!("fewer than {} lint warnings", self.fail_threshold),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_warning_lines() {
        let log = "warning: unused variable `x`\nnote: consider removing\nwarning[clippy::all]: needless clone";
        let warnings = LintCritic::parse_warnings(log);
        assert_eq!(warnings.len(), 2);
    }
}
