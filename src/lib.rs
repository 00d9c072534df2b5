//! # Miharu
//!
//! Usage telemetry for outbound OpenAI API calls.
//!
//! This library provides:
//! - A fetch decorator that observes calls to the OpenAI API without changing
//!   what the caller receives
//! - Cost estimation from token usage
//! - An ordered, single-writer queue that persists usage records to SQLite
//! - A small dashboard over the recorded calls
//!
//! ## Architecture
//!
//! ```text
//!   caller ──► FetchSlot ──► InterceptedFetch ──► original Fetch ──► network
//!                                  │
//!                      tee + ResponseInterpreter
//!                                  │
//!                             UsageRecord
//!                                  │
//!                                  ▼
//!                            RecordQueue ──(one insert at a time)──► RecordStore
//! ```
//!
//! ## Modules
//! - `interceptor`: fetch abstraction, call classification, interception
//! - `interpreter`: response to usage record
//! - `pricing`: per-model rates and cost estimation
//! - `queue`: asynchronous persistence queue
//! - `storage`: record store contract and SQLite engine
//! - `analytics`: aggregate statistics
//! - `api`: dashboard HTTP surface
//! - `collector`: `Miharu`, which wires the pieces together

pub mod analytics;
pub mod api;
pub mod collector;
pub mod config;
pub mod interceptor;
pub mod interpreter;
pub mod pricing;
pub mod queue;
pub mod record;
pub mod storage;

pub use collector::Miharu;
pub use config::Config;
pub use interceptor::{Fetch, FetchSlot, Interceptor, RecordSink};
pub use queue::{QueueState, RecordQueue};
pub use record::{CallStatus, UsageRecord};
pub use storage::{RecordStore, SqliteStore, StorageError};
