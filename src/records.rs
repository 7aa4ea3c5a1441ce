//! Data-access helpers for the `records` object store.
//!
//! Every helper takes the opened [`Database`] explicitly.

use crate::calendar::AcademicCalendar;
use crate::error::Result;
use crate::store::{Database, TransactionMode, RECORDS_STORE};
use crate::types::{AttendanceRecord, RecordKey, StoredRecord};

/// Read every pending record, in key order, in one readonly transaction.
pub fn get_all_records(db: &Database) -> Result<Vec<StoredRecord>> {
    let tx = db.transaction(RECORDS_STORE, TransactionMode::ReadOnly)?;
    tx.get_all()
}

/// Delete the given keys in one read-write transaction and wait for the commit.
///
/// Returns the number of deletions applied. Keys that are already gone are
/// counted but otherwise ignored.
pub fn delete_records(db: &Database, keys: &[RecordKey]) -> Result<usize> {
    if keys.is_empty() {
        return Ok(0);
    }
    let mut tx = db.transaction(RECORDS_STORE, TransactionMode::ReadWrite)?;
    for key in keys {
        tx.delete(*key)?;
    }
    let summary = tx.commit()?;
    Ok(summary.deleted)
}

pub fn delete_record(db: &Database, key: RecordKey) -> Result<()> {
    delete_records(db, &[key]).map(|_| ())
}

/// Queue an arbitrary JSON payload and return its key.
pub fn enqueue_value(db: &Database, value: serde_json::Value) -> Result<RecordKey> {
    let mut tx = db.transaction(RECORDS_STORE, TransactionMode::ReadWrite)?;
    tx.add(value)?;
    let summary = tx.commit()?;
    summary.added.first().copied().ok_or_else(|| {
        crate::RollcallError::Io("commit assigned no key to the added record".to_string())
    })
}

/// Validate and queue an attendance record, applying the calendar rules for
/// its role.
pub fn enqueue_record(
    db: &Database,
    calendar: &AcademicCalendar,
    record: &AttendanceRecord,
) -> Result<RecordKey> {
    record.validate()?;
    calendar.check(record)?;
    let key = enqueue_value(db, record.to_json()?)?;
    tracing::debug!(
        "Queued attendance for user {} ({}) under key {}",
        record.user_id,
        record.role,
        key
    );
    Ok(key)
}

pub fn count_records(db: &Database) -> Result<usize> {
    db.transaction(RECORDS_STORE, TransactionMode::ReadOnly)?
        .count()
}
