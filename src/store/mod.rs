//! Embedded record database: named, versioned databases holding object stores
//! of JSON values under auto-incrementing keys.

pub mod database;
pub mod object_store;
pub mod transaction;

pub use database::{Database, DatabaseSchema};
pub use object_store::{CommitSummary, ObjectStore};
pub use transaction::{Transaction, TransactionMode};

pub const ATTENDANCE_DB: &str = "AttendanceDB";
pub const ATTENDANCE_DB_VERSION: u32 = 1;
pub const RECORDS_STORE: &str = "records";
