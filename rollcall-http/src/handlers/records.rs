use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use super::AppState;
use crate::dto::{EnqueueResponse, PendingRecordsResponse};
use rollcall::error::RollcallError;
use rollcall::records::get_all_records;
use rollcall::AttendanceRecord;

/// POST /records
/// Queue an attendance entry recorded while offline. Students are refused on
/// holidays without an extra class.
pub async fn enqueue_record(
    State(state): State<Arc<AppState>>,
    Json(record): Json<AttendanceRecord>,
) -> Result<(StatusCode, Json<EnqueueResponse>), RollcallError> {
    let key = rollcall::records::enqueue_record(&state.db, &state.calendar, &record)?;
    Ok((StatusCode::CREATED, Json(EnqueueResponse { key })))
}

/// GET /records
/// Records still waiting to be synced, with their store keys
pub async fn list_pending_records(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PendingRecordsResponse>, RollcallError> {
    let records = get_all_records(&state.db)?;
    Ok(Json(PendingRecordsResponse {
        count: records.len(),
        records,
    }))
}
