//! Turns a provider response into a [`UsageRecord`].
//!
//! Interpretation never fails: anything that cannot be read as a successful
//! completion degrades to an error record.

use serde::Deserialize;

use crate::interceptor::FetchResponse;
use crate::pricing::PricingTable;
use crate::record::{generate_id, UsageRecord, UNKNOWN_MODEL};

/// Provider response body (OpenAI-compatible). Only the fields needed for
/// telemetry are read.
#[derive(Debug, Deserialize)]
struct ProviderResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<ProviderUsage>,
}

/// Usage data. Missing or null counts read as zero.
#[derive(Debug, Default, Deserialize)]
struct ProviderUsage {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
}

/// Builds usage records from responses using an injectable pricing table.
#[derive(Debug, Clone, Default)]
pub struct ResponseInterpreter {
    pricing: PricingTable,
}

impl ResponseInterpreter {
    pub fn new(pricing: PricingTable) -> Self {
        Self { pricing }
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Interpret a response. `duration_ms` is measured by the caller around
    /// the network call.
    pub fn interpret(&self, response: &FetchResponse, duration_ms: u64) -> UsageRecord {
        if !response.ok() {
            tracing::info!(
                "API call failed with status {}: {}",
                response.status(),
                excerpt(&response.text())
            );
            return UsageRecord::error(duration_ms);
        }

        match response.json::<ProviderResponse>() {
            Ok(parsed) => self.from_parsed(parsed, duration_ms),
            Err(e) => {
                tracing::warn!("Error parsing response: {}", e);
                UsageRecord::error(duration_ms)
            }
        }
    }

    fn from_parsed(&self, parsed: ProviderResponse, duration_ms: u64) -> UsageRecord {
        let usage = parsed.usage.unwrap_or_default();
        let prompt_tokens = usage.prompt_tokens.unwrap_or(0);
        let completion_tokens = usage.completion_tokens.unwrap_or(0);
        let model = parsed.model.unwrap_or_else(|| UNKNOWN_MODEL.to_string());
        let cost = self
            .pricing
            .estimate_cost(&model, prompt_tokens, completion_tokens);

        UsageRecord::success(
            parsed.id.unwrap_or_else(generate_id),
            model,
            prompt_tokens,
            completion_tokens,
            cost,
            duration_ms,
        )
    }
}

/// First 200 characters of a body, for log lines.
fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
