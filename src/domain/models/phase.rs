//! Phase lifecycle — the fixed ordered stages every task traverses.

use serde::{Deserialize, Serialize};

/// One stage of a task's execution lifecycle.
///
/// The ordered set is identical for every task. `Gate` is conditionally
/// inserted between `Think` and `Implement` when the implementation is
/// expected to touch more than one file or more than 20 net lines of code
/// (see [`Phase::gate_required`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Strategize,
    Spec,
    Plan,
    Think,
    /// Conditional: Five-Forces-style design analysis, only when the change
    /// is non-trivial.
    Gate,
    Implement,
    Verify,
    Review,
    Pr,
    Monitor,
}

impl Phase {
    /// The fixed phase order, including `Gate`. Callers that need the
    /// per-task sequence should filter `Gate` out via
    /// [`Phase::sequence_for`] instead of using this constant directly.
    pub const ALL: [Phase; 10] = [
        Phase::Strategize,
        Phase::Spec,
        Phase::Plan,
        Phase::Think,
        Phase::Gate,
        Phase::Implement,
        Phase::Verify,
        Phase::Review,
        Phase::Pr,
        Phase::Monitor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strategize => "strategize",
            Self::Spec => "spec",
            Self::Plan => "plan",
            Self::Think => "think",
            Self::Gate => "gate",
            Self::Implement => "implement",
            Self::Verify => "verify",
            Self::Review => "review",
            Self::Pr => "pr",
            Self::Monitor => "monitor",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "strategize" => Some(Self::Strategize),
            "spec" => Some(Self::Spec),
            "plan" => Some(Self::Plan),
            "think" => Some(Self::Think),
            "gate" => Some(Self::Gate),
            "implement" => Some(Self::Implement),
            "verify" => Some(Self::Verify),
            "review" => Some(Self::Review),
            "pr" => Some(Self::Pr),
            "monitor" => Some(Self::Monitor),
            _ => None,
        }
    }

    /// The concrete phase sequence for a task, inserting `Gate` only when
    /// required (spec §3: >1 file OR >20 net LOC).
    pub fn sequence_for(gate_required: bool) -> Vec<Phase> {
        Self::ALL
            .into_iter()
            .filter(|p| *p != Phase::Gate || gate_required)
            .collect()
    }

    /// Whether the implementation scope requires the GATE phase.
    pub fn gate_required(files_touched: u32, net_loc: u32) -> bool {
        files_touched > 1 || net_loc > 20
    }

    /// The next phase in a task's concrete sequence, if any.
    pub fn next(&self, gate_required: bool) -> Option<Phase> {
        let seq = Self::sequence_for(gate_required);
        let idx = seq.iter().position(|p| p == self)?;
        seq.get(idx + 1).copied()
    }

    /// Required evidence artifact name(s) for this phase.
    ///
    /// Each phase produces exactly one primary artifact; `Implement` and
    /// `Verify` additionally produce a log artifact.
    pub fn required_artifacts(&self) -> &'static [&'static str] {
        match self {
            Self::Strategize => &["strategy.md"],
            Self::Spec => &["spec.md"],
            Self::Plan => &["plan.md"],
            Self::Think => &["think.md"],
            Self::Gate => &["design.md"],
            Self::Implement => &["implement.log"],
            Self::Verify => &["verify.log"],
            Self::Review => &["review.md"],
            Self::Pr => &["pr.md"],
            Self::Monitor => &["monitor.md"],
        }
    }

    /// Phases whose completion is required before a task may be marked
    /// `done` (spec §4.8 rule 6). `Pr` and `Gate` are excluded: `Pr` is an
    /// output, not a required precondition distinct from `Monitor`, and
    /// `Gate` is only required when it was actually triggered.
    pub const DONE_REQUIRED: [Phase; 6] = [
        Phase::Strategize,
        Phase::Spec,
        Phase::Plan,
        Phase::Think,
        Phase::Verify,
        Phase::Review,
    ];
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_without_gate_skips_gate() {
        let seq = Phase::sequence_for(false);
        assert!(!seq.contains(&Phase::Gate));
        assert_eq!(seq.len(), 9);
    }

    #[test]
    fn sequence_with_gate_includes_gate_between_think_and_implement() {
        let seq = Phase::sequence_for(true);
        let think_idx = seq.iter().position(|p| *p == Phase::Think).unwrap();
        let gate_idx = seq.iter().position(|p| *p == Phase::Gate).unwrap();
        let implement_idx = seq.iter().position(|p| *p == Phase::Implement).unwrap();
        assert_eq!(gate_idx, think_idx + 1);
        assert_eq!(implement_idx, gate_idx + 1);
    }

    #[test]
    fn gate_required_on_multi_file_change() {
        assert!(Phase::gate_required(2, 5));
        assert!(Phase::gate_required(1, 21));
        assert!(!Phase::gate_required(1, 20));
    }

    #[test]
    fn next_phase_respects_gate_flag() {
        assert_eq!(Phase::Think.next(false), Some(Phase::Implement));
        assert_eq!(Phase::Think.next(true), Some(Phase::Gate));
        assert_eq!(Phase::Gate.next(true), Some(Phase::Implement));
        assert_eq!(Phase::Monitor.next(true), None);
    }

    #[test]
    fn round_trip_str() {
        for p in Phase::ALL {
            assert_eq!(Phase::from_str(p.as_str()), Some(p));
        }
    }
}
