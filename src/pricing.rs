//! Model pricing and cost estimation.
//!
//! Rates are expressed in USD per 1K tokens. Costs are returned in cents with
//! full decimal precision; nothing is rounded before storage.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Model whose rates apply when a model is missing from the table.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Input and output rate for a single model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelRate {
    /// USD per 1K prompt tokens
    pub input_per_thousand: f64,
    /// USD per 1K completion tokens
    pub output_per_thousand: f64,
}

impl ModelRate {
    pub const fn new(input_per_thousand: f64, output_per_thousand: f64) -> Self {
        Self {
            input_per_thousand,
            output_per_thousand,
        }
    }
}

/// Static per-model rate table with a designated fallback entry.
#[derive(Debug, Clone)]
pub struct PricingTable {
    rates: HashMap<String, ModelRate>,
    fallback: ModelRate,
}

impl PricingTable {
    /// Create a table. `fallback` is used for every model not in `rates`.
    pub fn new(rates: HashMap<String, ModelRate>, fallback: ModelRate) -> Self {
        Self { rates, fallback }
    }

    /// OpenAI list prices (2024).
    pub fn openai() -> Self {
        let default_rate = ModelRate::new(0.0015, 0.002);
        let rates = HashMap::from([
            ("gpt-4".to_string(), ModelRate::new(0.03, 0.06)),
            ("gpt-4-turbo".to_string(), ModelRate::new(0.01, 0.03)),
            (DEFAULT_MODEL.to_string(), default_rate),
            ("gpt-3.5-turbo-0125".to_string(), ModelRate::new(0.0005, 0.0015)),
        ]);
        Self::new(rates, default_rate)
    }

    /// Rate for a model, falling back to the default tier.
    pub fn rate(&self, model: &str) -> ModelRate {
        self.rates.get(model).copied().unwrap_or(self.fallback)
    }

    pub fn contains(&self, model: &str) -> bool {
        self.rates.contains_key(model)
    }

    /// Cost of a call in cents.
    pub fn estimate_cost(&self, model: &str, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        let rate = self.rate(model);
        let input_cost = (prompt_tokens as f64 / 1000.0) * rate.input_per_thousand;
        let output_cost = (completion_tokens as f64 / 1000.0) * rate.output_per_thousand;
        (input_cost + output_cost) * 100.0
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::openai()
    }
}

fn default_table() -> &'static PricingTable {
    static TABLE: OnceLock<PricingTable> = OnceLock::new();
    TABLE.get_or_init(PricingTable::openai)
}

/// Estimate the cost in cents using the built-in OpenAI table.
pub fn estimate_cost(model: &str, prompt_tokens: u64, completion_tokens: u64) -> f64 {
    default_table().estimate_cost(model, prompt_tokens, completion_tokens)
}

/// Format a cent amount as dollars with precision scaled to its magnitude.
pub fn format_cost(cents: f64) -> String {
    let usd = cents / 100.0;
    if usd >= 0.01 {
        format!("${:.2}", usd)
    } else if usd >= 0.001 {
        format!("${:.3}", usd)
    } else {
        format!("${:.4}", usd)
    }
}
