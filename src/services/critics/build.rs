//! Build critic — parses a phase's build log evidence for compiler errors.
//!
//! Cheap, deterministic, authoritative: a failed build blocks phase
//! advancement outright and there is no point running the more expensive
//! critics once it fails (spec §4.5).

use async_trait::async_trait;

use crate::domain::errors::AutopilotError;
use crate::domain::models::{EvidenceBundle, Phase};
use crate::domain::ports::critic::{Critic, CriticCost, Finding, Report, ReportStatus, Severity};
use crate::domain::ports::EvidenceStore;

const ARTIFACT_NAME: &str = "build.log";
const APPLICABLE: [Phase; 1] = [Phase::Implement];

pub struct BuildCritic {
    store: std::sync::Arc<dyn EvidenceStore>,
}

impl BuildCritic {
    pub fn new(store: std::sync::Arc<dyn EvidenceStore>) -> Self {
        Self { store }
    }

    /// Extract error count and messages from a Rust compiler's stderr,
    /// trusting the `error: aborting due to N previous error(s)` summary
    /// line when present.
    fn parse_errors(log: &str) -> (u32, Vec<String>) {
        let mut errors = Vec::new();
        let mut error_count = 0u32;

        for line in log.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with("error") {
                errors.push(trimmed.to_string());
                error_count += 1;
            }
        }

        for line in log.lines().rev() {
            let trimmed = line.trim();
            if let Some(rest) = trimmed.strip_prefix("error: aborting due to ") {
                if let Some(count_str) = rest.split_whitespace().next() {
                    if let Ok(count) = count_str.parse::<u32>() {
                        error_count = count;
                        break;
                    }
                }
            }
        }

        (error_count, errors)
    }
}

#[async_trait]
impl Critic for BuildCritic {
    fn name(&self) -> &str {
        "build"
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
        let artifact = match evidence.find(ARTIFACT_NAME) {
            Some(a) => a,
            None => {
                return Ok(Report {
                    status: ReportStatus::Fail,
                    findings: vec![Finding {
                        severity: Severity::Blocking,
                        category: "build".into(),
                        message: format!("no {ARTIFACT_NAME} evidence produced"),
                        fix_suggestion: Some("run the build and record its output".into()),
                    }],
                    exit_criteria: "build log present and clean".into(),
                })
            }
        };

        let content = self
            .store
            .read_artifact(artifact.task_id, artifact.phase, ARTIFACT_NAME)
            .await?;
        let log = String::from_utf8_lossy(&content);
        let (error_count, errors) = Self::parse_errors(&log);

        if error_count == 0 {
            return Ok(Report::pass("build completes without compiler errors"));
        }

        Ok(Report {
            status: ReportStatus::Fail,
            findings: errors
                .into_iter()
                .take(10)
                .map(|message| Finding {
                    severity: Severity::Blocking,
                    category: "build".into(),
                    message,
                    fix_suggestion: None,
                })
                .collect(),
            exit_criteria: "build completes without compiler errors".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_with_summary() {
        let log = "error[E0308]: mismatched types\nerror: aborting due to 1 previous error";
        let (count, errors) = BuildCritic::parse_errors(log);
        assert_eq!(count, 1);
        assert!(!errors.is_empty());
    }

    #[test]
    fn parse_errors_clean_log() {
        let (count, errors) = BuildCritic::parse_errors("");
        assert_eq!(count, 0);
        assert!(errors.is_empty());
    }
}
