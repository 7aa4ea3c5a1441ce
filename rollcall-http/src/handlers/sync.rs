use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::AppState;
use crate::dto::{
    ConnectivityRequest, ConnectivityResponse, RegisterSyncRequest, RegisterSyncResponse,
    SyncEventRequest,
};
use rollcall_sync::types::RegistrationInfo;
use rollcall_sync::{EventOutcome, SyncError};

/// POST /sync/register
pub async fn register_sync(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterSyncRequest>,
) -> Response {
    if req.tag.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "tag must not be empty"})),
        )
            .into_response();
    }

    state.scheduler.register(&req.tag);
    (
        StatusCode::ACCEPTED,
        Json(RegisterSyncResponse {
            tag: req.tag,
            online: state.scheduler.is_online(),
        }),
    )
        .into_response()
}

/// GET /sync/registrations
pub async fn list_registrations(State(state): State<Arc<AppState>>) -> Json<Vec<RegistrationInfo>> {
    Json(state.scheduler.registrations())
}

/// POST /connectivity
/// Report a connectivity change; coming online fires pending registrations
pub async fn set_connectivity(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConnectivityRequest>,
) -> Json<ConnectivityResponse> {
    let fired = state.scheduler.set_online(req.online);
    Json(ConnectivityResponse {
        online: req.online,
        fired,
    })
}

/// POST /events/sync
/// Deliver one sync event now, bypassing registration and retry. Waits for an
/// in-flight sync of the same tag instead of running alongside it.
pub async fn dispatch_sync_event(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SyncEventRequest>,
) -> Response {
    match state
        .scheduler
        .dispatch_now(&req.tag, req.last_chance)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(EventOutcome::Sync(outcome))).into_response(),
        Err(e) => {
            tracing::warn!("[SYNC {}] event failed: {}", req.tag, e);
            let status = match &e {
                SyncError::Store(_) | SyncError::Task(_) | SyncError::Config(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                SyncError::Transport(_) | SyncError::Rejected { .. } => StatusCode::BAD_GATEWAY,
                SyncError::Serialization(_) => StatusCode::UNPROCESSABLE_ENTITY,
            };
            (
                status,
                Json(serde_json::json!({
                    "error": "sync_failed",
                    "message": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}
