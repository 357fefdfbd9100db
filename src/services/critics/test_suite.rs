//! Test suite critic — parses a test runner's log evidence for pass/fail
//! counts and failing test names (spec §4.5).

use async_trait::async_trait;

use crate::domain::errors::AutopilotError;
use crate::domain::models::{EvidenceBundle, Phase};
use crate::domain::ports::critic::{Critic, CriticCost, Finding, Report, ReportStatus, Severity};
use crate::domain::ports::EvidenceStore;

const ARTIFACT_NAME: &str = "test.log";
const APPLICABLE: [Phase; 1] = [Phase::Verify];

#[derive(Debug, Default, PartialEq, Eq)]
struct TestCounts {
    passed: u32,
    failed: u32,
    ignored: u32,
    failing_names: Vec<String>,
}

pub struct TestSuiteCritic {
    store: std::sync::Arc<dyn EvidenceStore>,
}

impl TestSuiteCritic {
    pub fn new(store: std::sync::Arc<dyn EvidenceStore>) -> Self {
        Self { store }
    }

    fn parse(log: &str) -> TestCounts {
        let mut counts = TestCounts::default();

        for line in log.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with("test ") && trimmed.ends_with("... ok") {
                counts.passed += 1;
            } else if trimmed.starts_with("test ") && trimmed.ends_with("... FAILED") {
                counts.failed += 1;
                if let Some(name) = trimmed
                    .strip_prefix("test ")
                    .and_then(|s| s.strip_suffix(" ... FAILED"))
                {
                    counts.failing_names.push(name.trim().to_string());
                }
            } else if trimmed.starts_with("test ") && trimmed.ends_with("... ignored") {
                counts.ignored += 1;
            }
        }

        for line in log.lines() {
            let trimmed = line.trim();
            if let Some(summary) = trimmed.strip_prefix("test result:") {
                if let Some(n) = extract_count(summary, "passed") {
                    counts.passed = n;
                }
                if let Some(n) = extract_count(summary, "failed") {
                    counts.failed = n;
                }
                if let Some(n) = extract_count(summary, "ignored") {
                    counts.ignored = n;
                }
            }
        }

        counts
    }
}

fn extract_count(summary: &str, keyword: &str) -> Option<u32> {
    summary.split(';').find_map(|part| {
        let part = part.trim();
        if !part.contains(keyword) {
            return None;
        }
        part.split_whitespace().find_map(|w| w.parse::<u32>().ok())
    })
}

#[async_trait]
impl Critic for TestSuiteCritic {
    fn name(&self) -> &str {
        "test-suite"
    }

    fn cost(&self) -> CriticCost {
        CriticCost::Expensive
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
                    category: "test".into(),
                    message: format!("no {ARTIFACT_NAME} evidence produced"),
                    fix_suggestion: Some("run the test suite and record its output".into()),
                }],
                exit_criteria: "all tests pass".into(),
            });
        };

        let content = self
            .store
            .read_artifact(artifact.task_id, artifact.phase, ARTIFACT_NAME)
            .await?;
        let counts = Self::parse(&String::from_utf8_lossy(&content));

        if counts.failed == 0 {
            return Ok(Report::pass("all tests pass"));
        }

        Ok(Report {
            status: ReportStatus::Fail,
            findings: counts
                .failing_names
                .into_iter()
                .map(|name| Finding {
                    severity: Severity::Blocking,
                    category: "test".into(),
                    message: format!("failing test: {name}"),
                    fix_suggestion: None,
                })
                .collect(),
            exit_criteria: "all tests pass".into(),
        })
    }
}
