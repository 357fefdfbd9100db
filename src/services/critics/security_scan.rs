//! Security scan critic — parses a vulnerability-audit log evidence (e.g.
//! `cargo audit`) for severity-bucketed findings (spec §4.5).

use async_trait::async_trait;

use crate::domain::errors::AutopilotError;
use crate::domain::models::{EvidenceBundle, Phase};
use crate::domain::ports::critic::{Critic, CriticCost, Finding, Report, ReportStatus, Severity};
use crate::domain::ports::EvidenceStore;

const ARTIFACT_NAME: &str = "security_scan.log";
const APPLICABLE: [Phase; 1] = [Phase::Verify];

pub struct SecurityScanCritic {
    store: std::sync::Arc<dyn EvidenceStore>,
}

impl SecurityScanCritic {
    pub fn new(store: std::sync::Arc<dyn EvidenceStore>) -> Self {
        Self { store }
    }

    fn parse(log: &str) -> Vec<(Severity, String)> {
        let mut findings = Vec::new();
        for line in log.lines() {
            let lower = line.to_lowercase();
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if lower.contains("critical") {
                findings.push((Severity::Blocking, trimmed.to_string()));
            } else if lower.contains("high") && (lower.contains("severity") || lower.contains("vulnerability")) {
                findings.push((Severity::Blocking, trimmed.to_string()));
            } else if lower.contains("medium") && (lower.contains("severity") || lower.contains("vulnerability")) {
                findings.push((Severity::Warning, trimmed.to_string()));
            }
        }
        findings
    }
}

#[async_trait]
impl Critic for SecurityScanCritic {
    fn name(&self) -> &str {
        "security-scan"
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
            return Ok(Report::pass("security scan optional; none produced"));
        };
        let content = self
            .store
            .read_artifact(artifact.task_id, artifact.phase, ARTIFACT_NAME)
            .await?;
        let findings = Self::parse(&String::from_utf8_lossy(&content));

        if findings.is_empty() {
            return Ok(Report::pass("no vulnerabilities reported"));
        }

        let status = if findings.iter().any(|(s, _)| *s == Severity::Blocking) {
            ReportStatus::Fail
        } else {
            ReportStatus::Warn
        };

        Ok(Report {
            status,
            findings: findings
                .into_iter()
                .map(|(severity, message)| Finding {
                    severity,
                    category: "security".into(),
                    message,
                    fix_suggestion: None,
                })
                .collect(),
            exit_criteria: "no critical/high severity vulnerabilities".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_finding_is_blocking() {
        let findings = SecurityScanCritic::parse("Critical vulnerability in crate foo");
        assert_eq!(findings[0].0, Severity::Blocking);
    }

    #[test]
    fn medium_severity_is_warning() {
        let findings = SecurityScanCritic::parse("medium severity vulnerability in crate bar");
        assert_eq!(findings[0].0, Severity::Warning);
    }

    #[test]
    fn clean_scan_has_no_findings() {
        assert!(SecurityScanCritic::parse("no vulnerabilities found").is_empty());
    }
}
