//! Outbound call interception.
//!
//! - `fetch`: the outbound-call abstraction and its replaceable slot
//! - `classifier`: decides which calls are tracked
//! - `wrapper`: the decorator that records telemetry for tracked calls

mod classifier;
mod fetch;
mod wrapper;

pub use classifier::{extract_url, is_tracked_call, TRACKED_HOST};
pub use fetch::{
    Fetch, FetchError, FetchRef, FetchResponse, FetchSlot, OutboundRequest, ReqwestFetch,
    RequestInit, RequestInput,
};
pub use wrapper::{
    InstallOutcome, InterceptError, InterceptedFetch, Interceptor, RecordSink, SinkRef,
};
