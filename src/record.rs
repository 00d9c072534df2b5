//! Usage record model.
//!
//! A [`UsageRecord`] is built once per tracked call, handed to the persistence
//! queue and never mutated afterwards.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

/// Model name recorded when a call failed before a model could be determined.
pub const UNKNOWN_MODEL: &str = "unknown";

/// Prefix of locally generated record ids.
const LOCAL_ID_PREFIX: &str = "miharu";

/// Outcome of a tracked call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Success,
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    /// Parse the stored column value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted telemetry entry for a tracked call.
///
/// Serialized field names match the `llm_calls` table columns so the JSON API
/// and the store agree on a single shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: String,
    /// Milliseconds since epoch, assigned when the record is built.
    pub timestamp: i64,
    pub model: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// Cost in cents, unrounded.
    pub cost_cents: f64,
    pub duration_ms: u64,
    pub status: CallStatus,
}

impl UsageRecord {
    /// Build a success record from parsed usage data.
    pub fn success(
        id: impl Into<String>,
        model: impl Into<String>,
        prompt_tokens: u64,
        completion_tokens: u64,
        cost_cents: f64,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp: now_millis(),
            model: model.into(),
            prompt_tokens,
            completion_tokens,
            cost_cents,
            duration_ms,
            status: CallStatus::Success,
        }
    }

    /// Build an error record. Counts and cost are always zero.
    pub fn error(duration_ms: u64) -> Self {
        Self {
            id: generate_id(),
            timestamp: now_millis(),
            model: UNKNOWN_MODEL.to_string(),
            prompt_tokens: 0,
            completion_tokens: 0,
            cost_cents: 0.0,
            duration_ms,
            status: CallStatus::Error,
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

static LAST_TIMESTAMP: AtomicI64 = AtomicI64::new(0);

/// Current wall-clock time in milliseconds, never lower than a value
/// previously returned by this function.
pub fn now_millis() -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    let previous = LAST_TIMESTAMP.fetch_max(now, Ordering::SeqCst);
    previous.max(now)
}

/// Generate a local record id: `miharu_<millis>_<9 random chars>`.
pub fn generate_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!(
        "{}_{}_{}",
        LOCAL_ID_PREFIX,
        chrono::Utc::now().timestamp_millis(),
        suffix
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_error_record_is_zeroed() {
        let record = UsageRecord::error(42);
        assert_eq!(record.model, UNKNOWN_MODEL);
        assert_eq!(record.total_tokens(), 0);
        assert_eq!(record.cost_cents, 0.0);
        assert_eq!(record.duration_ms, 42);
        assert_eq!(record.status, CallStatus::Error);
        assert!(record.id.starts_with("miharu_"));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let ids: HashSet<String> = (0..500).map(|_| generate_id()).collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn test_now_millis_never_goes_backwards() {
        let mut last = now_millis();
        for _ in 0..1000 {
            let next = now_millis();
            assert!(next >= last);
            last = next;
        }
    }

    #[test]
    fn test_status_round_trips_through_column_text() {
        assert_eq!(CallStatus::parse("success"), Some(CallStatus::Success));
        assert_eq!(CallStatus::parse(CallStatus::Error.as_str()), Some(CallStatus::Error));
        assert_eq!(CallStatus::parse("pending"), None);
        assert_eq!(
            serde_json::to_string(&CallStatus::Success).unwrap(),
            "\"success\""
        );
    }
}
