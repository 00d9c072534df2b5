//! Dashboard HTTP API.
//!
//! - `GET /` renders an aggregate view of recorded calls
//! - `GET /api/calls` returns every call as JSON, newest first

mod dashboard;
mod routes;

pub use routes::{router, serve, AppState};
