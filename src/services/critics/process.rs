//! Process critic — confirms a phase produced its required evidence
//! artifacts (spec §4.5's "process critic").

use async_trait::async_trait;

use crate::domain::errors::AutopilotError;
use crate::domain::models::{EvidenceBundle, Phase};
use crate::domain::ports::critic::{Critic, CriticCost, Finding, Report, ReportStatus, Severity};

const APPLICABLE: [Phase; 10] = Phase::ALL;

#[derive(Default)]
pub struct ProcessCritic;

#[async_trait]
impl Critic for ProcessCritic {
    fn name(&self) -> &str {
        "process"
    }

    fn cost(&self) -> CriticCost {
        CriticCost::Cheap
    }

    fn applicable_phases(&self) -> &[Phase] {
        &APPLICABLE
    }

    fn is_authoritative(&self) -> bool {
        true
    }

    fn is_deterministic(&self) -> bool {
        true
    }

    async fn measure(&self, evidence: &EvidenceBundle) -> Result<Report, AutopilotError> {
        let Some(phase) = evidence.artifacts.first().map(|a| a.phase) else {
            return Ok(Report::pass("no phase evidence to evaluate yet"));
        };
        let required = phase.required_artifacts();
        let missing = evidence.missing(required);

        if missing.is_empty() {
            return Ok(Report::pass(format!(
                "all required {phase} artifacts present"
            )));
        }

        Ok(Report {
            status: ReportStatus::Fail,
            findings: missing
                .into_iter()
                .map(|name| Finding {
                    severity: Severity::Blocking,
                    category: "process".into(),
                    message: format!("missing required artifact `{name}` for phase {phase}"),
                    fix_suggestion: Some(format!("produce {name} before leaving {phase}")),
                })
                .collect(),
            exit_criteria: format!("all of {required:?} present"),
        })
    }
}
