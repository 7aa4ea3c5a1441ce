use axum::{extract::State, Json};
use std::sync::Arc;

use super::AppState;
use rollcall::AcademicCalendar;

/// GET /calendar
pub async fn get_calendar(State(state): State<Arc<AppState>>) -> Json<AcademicCalendar> {
    Json(state.calendar.clone())
}
