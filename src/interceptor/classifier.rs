//! Decides whether an outbound call targets the tracked provider.

use super::fetch::RequestInput;

/// Host substring identifying calls to the tracked provider.
pub const TRACKED_HOST: &str = "api.openai.com";

/// True when `url` contains the tracked host. Matching is a case-sensitive
/// substring test over the whole URL.
pub fn is_tracked_call(url: &str) -> bool {
    url.contains(TRACKED_HOST)
}

/// Normalize any accepted request shape into a URL string.
pub fn extract_url(input: &RequestInput) -> String {
    match input {
        RequestInput::Str(s) => s.clone(),
        RequestInput::Url(u) => u.as_str().to_string(),
        RequestInput::Request(r) => r.url.clone(),
    }
}
