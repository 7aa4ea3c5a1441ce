use axum::{extract::State, Json};
use std::sync::Arc;

use super::AppState;

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let status = state.scheduler.status();
    let worker = state.scheduler.worker();
    let pending = rollcall::records::count_records(&state.db).ok();

    Json(serde_json::json!({
        "status": "ok",
        "database": state.db.name(),
        "database_version": state.db.version(),
        "pending_records": pending,
        "worker_state": worker.state(),
        "controlling": worker.is_controlling(),
        "online": status.online,
        "sync_tag": status.tag,
        "registrations": status.registrations,
        "last_sync_success": status.last_success,
    }))
}
