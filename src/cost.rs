//! Turns token counts into a dollar estimate.

use crate::oracle::TokenUsage;

const PER_MILLION: f64 = 1_000_000.0;

/// Per-million-token prices for a model. Run-level, not per call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rates {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Default for Rates {
    /// gpt-4o-mini list prices in USD.
    fn default() -> Self {
        Self {
            input_per_million: 0.15,
            output_per_million: 0.60,
        }
    }
}

impl Rates {
    /// Cost of a single response.
    pub fn cost_of(&self, usage: TokenUsage) -> f64 {
        (usage.input_tokens as f64 / PER_MILLION) * self.input_per_million
            + (usage.output_tokens as f64 / PER_MILLION) * self.output_per_million
    }

    /// Total cost of a run. Responses without usage metadata count as free.
    pub fn cost<I>(&self, usages: I) -> f64
    where
        I: IntoIterator<Item = Option<TokenUsage>>,
    {
        usages.into_iter().flatten().map(|u| self.cost_of(u)).sum()
    }
}

/// Format a dollar amount with enough precision for sub-cent runs.
pub fn format_cost(cost: f64) -> String {
    format!("${:.6}", cost)
}
