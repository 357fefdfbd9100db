//! Quality Graph Node — the fixed 15-dimension quality vector a task
//! accumulates across phases (spec §3, §4.8).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ordered, fixed set of named quality dimensions. `AcceptanceCriteria` and
/// `BusinessValue` from the original distillation are collapsed into a
/// single `OutcomeAlignment` dimension (see DESIGN.md Open Question 1) so
/// the vector stays a round 15 entries.
pub const DIMENSIONS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Completeness,
    Correctness,
    Coverage,
    Consistency,
    Performance,
    Security,
    Maintainability,
    Scalability,
    EvidenceStrength,
    PeerAgreement,
    HistoricalMatch,
    RiskMitigation,
    IntentAlignment,
    PurposeConnection,
    OutcomeAlignment,
}

impl Dimension {
    pub const ALL: [Dimension; DIMENSIONS] = [
        Dimension::Completeness,
        Dimension::Correctness,
        Dimension::Coverage,
        Dimension::Consistency,
        Dimension::Performance,
        Dimension::Security,
        Dimension::Maintainability,
        Dimension::Scalability,
        Dimension::EvidenceStrength,
        Dimension::PeerAgreement,
        Dimension::HistoricalMatch,
        Dimension::RiskMitigation,
        Dimension::IntentAlignment,
        Dimension::PurposeConnection,
        Dimension::OutcomeAlignment,
    ];

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|d| d == self).expect("all variants listed in ALL")
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completeness => "completeness",
            Self::Correctness => "correctness",
            Self::Coverage => "coverage",
            Self::Consistency => "consistency",
            Self::Performance => "performance",
            Self::Security => "security",
            Self::Maintainability => "maintainability",
            Self::Scalability => "scalability",
            Self::EvidenceStrength => "evidence_strength",
            Self::PeerAgreement => "peer_agreement",
            Self::HistoricalMatch => "historical_match",
            Self::RiskMitigation => "risk_mitigation",
            Self::IntentAlignment => "intent_alignment",
            Self::PurposeConnection => "purpose_connection",
            Self::OutcomeAlignment => "outcome_alignment",
        }
    }
}

/// A task's accumulated quality vector, scored `[0.0, 1.0]` per dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityGraphNode {
    pub task_id: Uuid,
    pub scores: [f32; DIMENSIONS],
}

impl QualityGraphNode {
    pub fn new(task_id: Uuid) -> Self {
        Self {
            task_id,
            scores: [0.0; DIMENSIONS],
        }
    }

    pub fn set(&mut self, dim: Dimension, value: f32) {
        self.scores[dim.index()] = value.clamp(0.0, 1.0);
    }

    pub fn get(&self, dim: Dimension) -> f32 {
        self.scores[dim.index()]
    }

    /// Unweighted mean across all dimensions.
    pub fn overall(&self) -> f32 {
        self.scores.iter().sum::<f32>() / DIMENSIONS as f32
    }

    /// Dimensions falling below `threshold`, for remediation-requirement
    /// generation (spec §4.8 step 4).
    pub fn below_threshold(&self, threshold: f32) -> Vec<Dimension> {
        Dimension::ALL
            .into_iter()
            .filter(|d| self.get(*d) < threshold)
            .collect()
    }

    pub fn meets_gate(&self, threshold: f32) -> bool {
        self.below_threshold(threshold).is_empty()
    }
}

/// Cosine similarity between two equal-length score vectors, in `[-1.0, 1.0]`
/// (in practice `[0.0, 1.0]` since every dimension is non-negative). Returns
/// `0.0` for a zero-magnitude vector rather than dividing by zero.
pub fn cosine_similarity(a: &[f32; DIMENSIONS], b: &[f32; DIMENSIONS]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Bounded ring of past tasks' finished quality vectors, used to score how
/// much a task's current vector diverges from historical precedent (spec
/// §4.8 step 2's `historical_match` dimension).
pub struct HistoricalPatternStore {
    patterns: std::collections::VecDeque<[f32; DIMENSIONS]>,
    capacity: usize,
}

/// How many completed quality vectors to retain for divergence scoring.
pub const MAX_HISTORICAL_PATTERNS: usize = 200;

impl Default for HistoricalPatternStore {
    fn default() -> Self {
        Self::new(MAX_HISTORICAL_PATTERNS)
    }
}

impl HistoricalPatternStore {
    pub fn new(capacity: usize) -> Self {
        Self { patterns: std::collections::VecDeque::with_capacity(capacity), capacity }
    }

    pub fn record(&mut self, scores: [f32; DIMENSIONS]) {
        if self.patterns.len() == self.capacity {
            self.patterns.pop_front();
        }
        self.patterns.push_back(scores);
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Similarity to the single closest historical pattern, or `1.0` (fully
    /// consistent, nothing to diverge from) when the store is empty.
    pub fn nearest_similarity(&self, scores: &[f32; DIMENSIONS]) -> f32 {
        self.patterns
            .iter()
            .map(|p| cosine_similarity(p, scores))
            .fold(None, |best: Option<f32>, sim| Some(best.map_or(sim, |b| b.max(sim))))
            .unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_node_starts_at_zero() {
        let node = QualityGraphNode::new(Uuid::new_v4());
        assert_eq!(node.overall(), 0.0);
    }

    #[test]
    fn set_clamps_to_unit_interval() {
        let mut node = QualityGraphNode::new(Uuid::new_v4());
        node.set(Dimension::Security, 1.5);
        assert_eq!(node.get(Dimension::Security), 1.0);
        node.set(Dimension::Security, -1.0);
        assert_eq!(node.get(Dimension::Security), 0.0);
    }

    #[test]
    fn below_threshold_lists_failing_dimensions() {
        let mut node = QualityGraphNode::new(Uuid::new_v4());
        for dim in Dimension::ALL {
            node.set(dim, 0.9);
        }
        node.set(Dimension::Security, 0.2);
        let below = node.below_threshold(0.7);
        assert_eq!(below, vec![Dimension::Security]);
        assert!(!node.meets_gate(0.7));
    }

    #[test]
    fn all_dimensions_have_unique_index() {
        let mut indices: Vec<usize> = Dimension::ALL.iter().map(|d| d.index()).collect();
        indices.sort_unstable();
        indices.dedup();
        assert_eq!(indices.len(), DIMENSIONS);
    }

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let mut node = QualityGraphNode::new(Uuid::new_v4());
        for dim in Dimension::ALL {
            node.set(dim, 0.8);
        }
        let sim = cosine_similarity(&node.scores, &node.scores);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_zero_vector_is_zero() {
        let zero = [0.0f32; DIMENSIONS];
        let other = [0.5f32; DIMENSIONS];
        assert_eq!(cosine_similarity(&zero, &other), 0.0);
    }

    #[test]
    fn empty_historical_store_reports_full_similarity() {
        let store = HistoricalPatternStore::new(8);
        let scores = [0.5f32; DIMENSIONS];
        assert_eq!(store.nearest_similarity(&scores), 1.0);
    }

    #[test]
    fn historical_store_finds_closer_of_two_patterns() {
        let mut store = HistoricalPatternStore::new(8);
        let mut far = [0.1f32; DIMENSIONS];
        far[0] = 0.9;
        let mut near = [0.5f32; DIMENSIONS];
        near[0] = 0.5;
        store.record(far);
        store.record(near);

        let query = [0.5f32; DIMENSIONS];
        let sim = store.nearest_similarity(&query);
        assert!(sim > cosine_similarity(&far, &query));
    }

    #[test]
    fn historical_store_evicts_oldest_past_capacity() {
        let mut store = HistoricalPatternStore::new(2);
        store.record([0.1; DIMENSIONS]);
        store.record([0.2; DIMENSIONS]);
        store.record([0.3; DIMENSIONS]);
        assert_eq!(store.len(), 2);
    }
}
