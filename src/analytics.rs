//! Aggregate statistics over stored calls.

use serde::Serialize;

use crate::record::UsageRecord;

/// Summary shown at the top of the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_calls: usize,
    /// Cents
    pub total_cost: f64,
    pub total_tokens: u64,
    /// Rounded mean duration in milliseconds
    pub avg_response_time: u64,
}

pub fn calculate_stats(records: &[UsageRecord]) -> Stats {
    if records.is_empty() {
        return Stats::default();
    }

    let total_cost = records.iter().map(|r| r.cost_cents).sum();
    let total_tokens = records.iter().map(UsageRecord::total_tokens).sum();
    let total_duration: u64 = records.iter().map(|r| r.duration_ms).sum();
    let avg_response_time = (total_duration as f64 / records.len() as f64).round() as u64;

    Stats {
        total_calls: records.len(),
        total_cost,
        total_tokens,
        avg_response_time,
    }
}
