//! Model-aware cost tracking with per-model pricing, grounding
//! `AgentSubstrate::estimate_cost_usd` and the Operations Manager's rolling
//! cost summary (spec §4.9).

use std::collections::HashMap;

/// Pricing per million tokens for a specific model.
#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
    pub cache_read: f64,
    pub cache_write: f64,
}

const PRICING_TABLE: &[(&str, ModelPricing)] = &[
    (
        "claude-opus-4-1",
        ModelPricing { input: 15.0, output: 75.0, cache_read: 1.5, cache_write: 18.75 },
    ),
    (
        "opus",
        ModelPricing { input: 15.0, output: 75.0, cache_read: 1.5, cache_write: 18.75 },
    ),
    (
        "claude-sonnet-4-5",
        ModelPricing { input: 3.0, output: 15.0, cache_read: 0.3, cache_write: 3.75 },
    ),
    (
        "sonnet",
        ModelPricing { input: 3.0, output: 15.0, cache_read: 0.3, cache_write: 3.75 },
    ),
    (
        "claude-haiku-4-5",
        ModelPricing { input: 0.80, output: 4.0, cache_read: 0.08, cache_write: 1.0 },
    ),
    (
        "haiku",
        ModelPricing { input: 0.80, output: 4.0, cache_read: 0.08, cache_write: 1.0 },
    ),
];

/// Pricing for a model by name or alias, matching substrings (e.g. "opus"
/// matches "claude-opus-4-1-20250805").
pub fn get_model_pricing(model: &str) -> Option<ModelPricing> {
    let model_lower = model.to_lowercase();
    PRICING_TABLE
        .iter()
        .find(|(name, _)| model_lower.contains(name))
        .map(|(_, pricing)| *pricing)
}

pub fn estimate_cost(
    model: &str,
    input_tokens: u64,
    output_tokens: u64,
    cache_read_tokens: u64,
    cache_write_tokens: u64,
) -> Option<f64> {
    let pricing = get_model_pricing(model)?;
    Some(
        (input_tokens as f64 * pricing.input
            + output_tokens as f64 * pricing.output
            + cache_read_tokens as f64 * pricing.cache_read
            + cache_write_tokens as f64 * pricing.cache_write)
            / 1_000_000.0,
    )
}

/// Rolling cost summary, observability-only (spec §4.9: "holds
/// web-inspiration/usage summary for observability but does not gate
/// execution on them").
#[derive(Debug, Clone, Default)]
pub struct CostSummary {
    pub total_usd: f64,
    pub by_model: HashMap<String, f64>,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub sample_count: u32,
}

impl CostSummary {
    pub fn add_sample(&mut self, model: &str, input_tokens: u64, output_tokens: u64) {
        self.total_input_tokens += input_tokens;
        self.total_output_tokens += output_tokens;
        self.sample_count += 1;

        if let Some(cost) = estimate_cost(model, input_tokens, output_tokens, 0, 0) {
            self.total_usd += cost;
            *self.by_model.entry(model.to_string()).or_default() += cost;
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "${:.4} across {} calls ({}K input, {}K output tokens)",
            self.total_usd,
            self.sample_count,
            self.total_input_tokens / 1000,
            self.total_output_tokens / 1000,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pricing_matches_alias() {
        let pricing = get_model_pricing("opus").unwrap();
        assert_eq!(pricing.input, 15.0);
    }

    #[test]
    fn pricing_matches_full_name() {
        let pricing = get_model_pricing("claude-opus-4-1-20250805").unwrap();
        assert_eq!(pricing.input, 15.0);
    }

    #[test]
    fn unknown_model_has_no_pricing() {
        assert!(get_model_pricing("unknown-model").is_none());
    }

    #[test]
    fn estimate_cost_input_and_output() {
        let cost = estimate_cost("opus", 1_000_000, 1_000_000, 0, 0).unwrap();
        assert!((cost - 90.0).abs() < 0.001);
    }

    #[test]
    fn summary_accumulates_across_models() {
        let mut summary = CostSummary::default();
        summary.add_sample("opus", 10_000, 5_000);
        summary.add_sample("haiku", 100_000, 50_000);
        assert_eq!(summary.sample_count, 2);
        assert_eq!(summary.by_model.len(), 2);
    }
}
