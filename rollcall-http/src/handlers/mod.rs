use rollcall::{AcademicCalendar, Database};
use rollcall_sync::SyncScheduler;
use std::sync::Arc;

pub mod calendar;
pub mod health;
pub mod records;
pub mod sync;

pub struct AppState {
    pub db: Database,
    pub calendar: AcademicCalendar,
    pub scheduler: Arc<SyncScheduler>,
}

pub use calendar::get_calendar;
pub use health::health;
pub use records::{enqueue_record, list_pending_records};
pub use sync::{dispatch_sync_event, list_registrations, register_sync, set_connectivity};
