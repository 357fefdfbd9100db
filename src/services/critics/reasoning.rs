//! Reasoning critic — checks the THINK phase's evidence for assumption
//! documentation and a pre-mortem section (spec §4.5). The Quality Gate
//! only invokes this critic for tasks whose complexity score reaches the
//! threshold in spec §4.8 step 2; the critic itself is complexity-agnostic.

use async_trait::async_trait;

use crate::domain::errors::AutopilotError;
use crate::domain::models::{EvidenceBundle, Phase};
use crate::domain::ports::critic::{Critic, CriticCost, Finding, Report, ReportStatus, Severity};
use crate::domain::ports::EvidenceStore;

const ARTIFACT_NAME: &str = "think.md";
const APPLICABLE: [Phase; 1] = [Phase::Think];

pub struct ReasoningCritic {
    store: std::sync::Arc<dyn EvidenceStore>,
}

impl ReasoningCritic {
    pub fn new(store: std::sync::Arc<dyn EvidenceStore>) -> Self {
        Self { store }
    }

    fn missing_sections(content: &str) -> Vec<&'static str> {
        let lower = content.to_lowercase();
        let mut missing = Vec::new();
        if !lower.contains("assumption") {
            missing.push("assumptions");
        }
        if !lower.contains("pre-mortem") && !lower.contains("premortem") {
            missing.push("pre-mortem");
        }
        missing
    }
}

#[async_trait]
impl Critic for ReasoningCritic {
    fn name(&self) -> &str {
        "reasoning"
    }

    fn cost(&self) -> CriticCost {
        CriticCost::Moderate
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
        let Some(artifact) = evidence.find(ARTIFACT_NAME) else {
            return Ok(Report {
                status: ReportStatus::Fail,
                findings: vec![Finding {
                    severity: Severity::Blocking,
                    category: "reasoning".into(),
                    message: format!("no {ARTIFACT_NAME} evidence produced"),
                    fix_suggestion: None,
                }],
                exit_criteria: "think.md documents assumptions and a pre-mortem".into(),
            });
        };
        let content = self
            .store
            .read_artifact(artifact.task_id, artifact.phase, ARTIFACT_NAME)
            .await?;
        let missing = Self::missing_sections(&String::from_utf8_lossy(&content));

        if missing.is_empty() {
            return Ok(Report::pass("think.md documents assumptions and a pre-mortem"));
        }

        Ok(Report {
            status: ReportStatus::Fail,
            findings: missing
                .into_iter()
                .map(|section| Finding {
                    severity: Severity::Blocking,
                    category: "reasoning".into(),
                    message: format!("think.md is missing a {section} section"),
                    fix_suggestion: Some(format!("add a {section} section to think.md")),
                })
                .collect(),
            exit_criteria: "think.md documents assumptions and a pre-mortem".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_missing_premortem() {
        let missing = ReasoningCritic::missing_sections("## Assumptions\n- foo");
        assert_eq!(missing, vec!["pre-mortem"]);
    }

    #[test]
    fn complete_document_has_no_gaps() {
        let missing =
            ReasoningCritic::missing_sections("## Assumptions\n...\n## Pre-Mortem\n...");
        assert!(missing.is_empty());
    }
}
