//! HTTP route handlers for the dashboard.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;

use crate::analytics::calculate_stats;
use crate::config::Config;
use crate::record::UsageRecord;
use crate::storage::{RecordStore, SharedRecordStore, SqliteStore};

use super::dashboard;

/// Shared application state.
pub struct AppState {
    pub store: SharedRecordStore,
}

/// Build the dashboard router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/calls", get(list_calls))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the dashboard server and block until Ctrl+C.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store = Arc::new(SqliteStore::open(&config.db_path).await?);
    let state = Arc::new(AppState {
        store: Arc::clone(&store) as SharedRecordStore,
    });

    let addr = format!("127.0.0.1:{}", config.dashboard_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Miharu dashboard running at http://localhost:{}", config.dashboard_port);
    tracing::info!("Press Ctrl+C to stop");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down dashboard...");
    store.close().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// GET /
/// Aggregate view with recent calls.
async fn index(State(state): State<Arc<AppState>>) -> Response {
    match state.store.select_all_ordered_by_timestamp_desc().await {
        Ok(records) => {
            let stats = calculate_stats(&records);
            Html(dashboard::render(&records, &stats)).into_response()
        }
        Err(e) => {
            tracing::error!("Dashboard error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

/// GET /api/calls
/// All calls, newest first.
async fn list_calls(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UsageRecord>>, (StatusCode, Json<serde_json::Value>)> {
    state
        .store
        .select_all_ordered_by_timestamp_desc()
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!("Failed to fetch calls: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Failed to fetch calls" })),
            )
        })
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}
