//! # Rollcall
//!
//! Offline attendance queue. Attendance entries recorded without connectivity
//! are kept in an embedded, versioned record database (`AttendanceDB`) and
//! later forwarded to the backend by the background sync worker in the
//! companion `rollcall-sync` crate.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use rollcall::calendar::AcademicCalendar;
//! use rollcall::records::{enqueue_record, get_all_records};
//! use rollcall::store::{Database, DatabaseSchema};
//! use rollcall::types::{AttendanceRecord, Role};
//!
//! # fn main() -> rollcall::Result<()> {
//! let db = Database::open("./data".as_ref(), &DatabaseSchema::attendance())?;
//! let calendar = AcademicCalendar::load_or_default("./data".as_ref());
//!
//! let record = AttendanceRecord::now(42, Role::Student, 12.97, 77.59);
//! let key = enqueue_record(&db, &calendar, &record)?;
//! assert_eq!(key, 1);
//!
//! let pending = get_all_records(&db)?;
//! println!("{} records waiting for sync", pending.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Dependencies | Use case |
//! |---------|-------------|----------|
//! | `axum-support` | axum | [`RollcallError`] implements `IntoResponse` |

pub mod calendar;
pub mod error;
pub mod records;
pub mod store;
pub mod types;

pub use calendar::AcademicCalendar;
pub use error::{Result, RollcallError};
pub use store::{Database, DatabaseSchema, TransactionMode};
pub use types::*;
