//! Bypass patterns — known ways an agent can make a task look complete
//! without actually satisfying its quality bar (spec §4.8 step 3).
//!
//! Each pattern must be detectable via at least two independent signals so a
//! single noisy critic can't trigger a false positive remediation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BypassPattern {
    /// A phase reports success with some of its required artifacts missing.
    Bp001PartialCompletion,
    /// Evidence content looks like unedited template/boilerplate: marker
    /// strings left in place, or low information content for its size.
    Bp002TemplateEvidence,
    /// A phase completed in implausibly little wall-clock time.
    Bp003ShortDuration,
    /// No self-check (lint/test/reasoning critic) ran for a phase that
    /// requires one.
    Bp004MissingSelfChecks,
    /// Phase marked done while a critic has an unresolved blocking finding.
    Bp005ClaimWithoutProof,
}

impl BypassPattern {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Bp001PartialCompletion => "BP001",
            Self::Bp002TemplateEvidence => "BP002",
            Self::Bp003ShortDuration => "BP003",
            Self::Bp004MissingSelfChecks => "BP004",
            Self::Bp005ClaimWithoutProof => "BP005",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Bp001PartialCompletion => "phase reported complete with required artifacts missing",
            Self::Bp002TemplateEvidence => "evidence looks like unedited template or boilerplate content",
            Self::Bp003ShortDuration => "phase completed in suspiciously little time",
            Self::Bp004MissingSelfChecks => "no self-check evidence for a phase that requires one",
            Self::Bp005ClaimWithoutProof => "task claimed done while a critic finding remains unresolved",
        }
    }

    pub const ALL: [BypassPattern; 5] = [
        Self::Bp001PartialCompletion,
        Self::Bp002TemplateEvidence,
        Self::Bp003ShortDuration,
        Self::Bp004MissingSelfChecks,
        Self::Bp005ClaimWithoutProof,
    ];
}

/// One independent signal that contributed to a bypass detection. A pattern
/// fires only once at least two distinct `source`s have reported it
/// (spec §4.8 rule: "≥2 independent detection paths").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BypassSignal {
    pub pattern: BypassPattern,
    pub source: String,
    pub detail: String,
}

/// Accumulates signals for a single task and decides whether the
/// corroboration threshold has been met.
#[derive(Debug, Clone, Default)]
pub struct BypassDetector {
    signals: Vec<BypassSignal>,
}

impl BypassDetector {
    pub fn record(&mut self, signal: BypassSignal) {
        self.signals.push(signal);
    }

    pub fn signals_for(&self, pattern: BypassPattern) -> impl Iterator<Item = &BypassSignal> {
        self.signals.iter().filter(move |s| s.pattern == pattern)
    }

    /// Patterns with signals from at least two distinct sources.
    pub fn confirmed(&self) -> Vec<BypassPattern> {
        let mut confirmed = Vec::new();
        for pattern in BypassPattern::ALL {
            let sources: std::collections::HashSet<&str> = self
                .signals
                .iter()
                .filter(|s| s.pattern == pattern)
                .map(|s| s.source.as_str())
                .collect();
            if sources.len() >= 2 {
                confirmed.push(pattern);
            }
        }
        confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_source_does_not_confirm() {
        let mut detector = BypassDetector::default();
        detector.record(BypassSignal {
            pattern: BypassPattern::Bp001PartialCompletion,
            source: "process_critic".into(),
            detail: "implement.log missing".into(),
        });
        assert!(detector.confirmed().is_empty());
    }

    #[test]
    fn two_independent_sources_confirm() {
        let mut detector = BypassDetector::default();
        detector.record(BypassSignal {
            pattern: BypassPattern::Bp001PartialCompletion,
            source: "process_critic".into(),
            detail: "implement.log missing".into(),
        });
        detector.record(BypassSignal {
            pattern: BypassPattern::Bp001PartialCompletion,
            source: "quality_gate".into(),
            detail: "required_artifacts not satisfied for Implement".into(),
        });
        assert_eq!(detector.confirmed(), vec![BypassPattern::Bp001PartialCompletion]);
    }

    #[test]
    fn same_source_twice_does_not_confirm() {
        let mut detector = BypassDetector::default();
        detector.record(BypassSignal {
            pattern: BypassPattern::Bp002TemplateEvidence,
            source: "entropy_scan".into(),
            detail: "low entropy content".into(),
        });
        detector.record(BypassSignal {
            pattern: BypassPattern::Bp002TemplateEvidence,
            source: "entropy_scan".into(),
            detail: "still low entropy".into(),
        });
        assert!(detector.confirmed().is_empty());
    }
}
