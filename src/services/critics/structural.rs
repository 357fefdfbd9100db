//! Structural critic — enforces net-lines-of-change and file-count limits
//! from the `diff_stat.txt` evidence a phase's commit produces (spec §4.5's
//! "structural proofs" / "LOC enforcement").

use async_trait::async_trait;

use crate::domain::errors::AutopilotError;
use crate::domain::models::{EvidenceBundle, Phase};
use crate::domain::ports::critic::{Critic, CriticCost, Finding, Report, ReportStatus, Severity};
use crate::domain::ports::EvidenceStore;

const ARTIFACT_NAME: &str = "diff_stat.txt";
const APPLICABLE: [Phase; 1] = [Phase::Implement];

pub struct StructuralCritic {
    store: std::sync::Arc<dyn EvidenceStore>,
    max_net_loc: u32,
    max_files: u32,
}

impl StructuralCritic {
    pub fn new(store: std::sync::Arc<dyn EvidenceStore>) -> Self {
        Self {
            store,
            max_net_loc: 400,
            max_files: 15,
        }
    }

    /// Parse `files_changed: N` / `net_loc: M` lines, defaulting to zero
    /// when a key is absent.
    fn parse(content: &str) -> (u32, u32) {
        let mut files_changed = 0u32;
        let mut net_loc = 0u32;
        for line in content.lines() {
            let line = line.trim();
            if let Some(v) = line.strip_prefix("files_changed:") {
                files_changed = v.trim().parse().unwrap_or(0);
            } else if let Some(v) = line.strip_prefix("net_loc:") {
                net_loc = v.trim().parse().unwrap_or(0);
            }
        }
        (files_changed, net_loc)
    }
}

#[async_trait]
impl Critic for StructuralCritic {
    fn name(&self) -> &str {
        "structural"
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
            return Ok(Report::pass("diff stat optional; none produced"));
        };
        let content = self
            .store
            .read_artifact(artifact.task_id, artifact.phase, ARTIFACT_NAME)
            .await?;
        let (files_changed, net_loc) = Self::parse(&String::from_utf8_lossy(&content));

        let mut findings = Vec::new();
        if net_loc > self.max_net_loc {
            findings.push(Finding {
                severity: Severity::Warning,
                category: "structural".into(),
                message: format!("net LOC {net_loc} exceeds limit {}", self.max_net_loc),
                fix_suggestion: Some("split the change into smaller commits".into()),
            });
        }
        if files_changed > self.max_files {
            findings.push(Finding {
                severity: Severity::Warning,
                category: "structural".into(),
                message: format!("{files_changed} files touched exceeds limit {}", self.max_files),
                fix_suggestion: Some("narrow the change's blast radius".into()),
            });
        }

        if findings.is_empty() {
            return Ok(Report::pass("change stays within structural limits"));
        }

        Ok(Report {
            status: ReportStatus::Warn,
            findings,
            exit_criteria: format!(
                "net_loc <= {} and files_changed <= {}",
                self.max_net_loc, self.max_files
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_diff_stat_lines() {
        let (files, loc) = StructuralCritic::parse("files_changed: 3\nnet_loc: 120\n");
        assert_eq!(files, 3);
        assert_eq!(loc, 120);
    }

    #[test]
    fn missing_keys_default_to_zero() {
        let (files, loc) = StructuralCritic::parse("");
        assert_eq!(files, 0);
        assert_eq!(loc, 0);
    }
}
