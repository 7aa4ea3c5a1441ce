/// Integration tests for embedding Rollcall as a library.
///
/// Exercises the store and record helpers without the sync or HTTP crates:
/// - Queueing and reading attendance records
/// - Persistence across open/close cycles
/// - Schema versioning and upgrades
/// - Transaction atomicity
use rollcall::records::{
    count_records, delete_record, delete_records, enqueue_record, enqueue_value, get_all_records,
};
use rollcall::store::{ATTENDANCE_DB, RECORDS_STORE};
use rollcall::{
    AcademicCalendar, AttendanceRecord, Database, DatabaseSchema, Role, RollcallError,
    TransactionMode,
};
use serde_json::json;
use tempfile::TempDir;

// ============================================================
// Records: queue, read, delete
// ============================================================

#[test]
fn test_attendance_round_trip_through_store() {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path(), &DatabaseSchema::attendance()).unwrap();

    let record = AttendanceRecord {
        user_id: 17,
        timestamp: "2026-10-18 09:00:00".to_string(),
        lat: 51.5074,
        lon: -0.1278,
        role: Role::Teacher,
    };
    let key = enqueue_record(&db, &AcademicCalendar::default(), &record).unwrap();
    assert_eq!(key, 1);

    let records = get_all_records(&db).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key, 1);
    assert_eq!(
        records[0].value,
        json!({
            "userId": 17,
            "timestamp": "2026-10-18 09:00:00",
            "lat": 51.5074,
            "lon": -0.1278,
            "role": "Teacher"
        })
    );
}

#[test]
fn test_invalid_record_is_not_queued() {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path(), &DatabaseSchema::attendance()).unwrap();

    let record = AttendanceRecord::now(1, Role::Student, 0.0, 181.0);
    let err = enqueue_record(&db, &AcademicCalendar::default(), &record).unwrap_err();
    assert!(matches!(err, RollcallError::InvalidGeolocation { .. }));
    assert_eq!(count_records(&db).unwrap(), 0);
}

#[test]
fn test_delete_by_key_leaves_other_records() {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path(), &DatabaseSchema::attendance()).unwrap();
    for id in 1..=4 {
        enqueue_value(&db, json!({ "userId": id })).unwrap();
    }

    delete_records(&db, &[1, 3]).unwrap();
    delete_record(&db, 4).unwrap();

    let keys: Vec<u64> = get_all_records(&db).unwrap().iter().map(|r| r.key).collect();
    assert_eq!(keys, vec![2]);
}

// ============================================================
// Persistence
// ============================================================

#[test]
fn test_records_and_key_generator_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let db = Database::open(temp_dir.path(), &DatabaseSchema::attendance()).unwrap();
        enqueue_value(&db, json!({"userId": 1})).unwrap();
        enqueue_value(&db, json!({"userId": 2})).unwrap();
        delete_record(&db, 2).unwrap();
    }

    let db = Database::open(temp_dir.path(), &DatabaseSchema::attendance()).unwrap();
    assert_eq!(count_records(&db).unwrap(), 1);
    // Key 2 was used before the restart and must not come back.
    assert_eq!(enqueue_value(&db, json!({"userId": 3})).unwrap(), 3);
}

#[test]
fn test_database_lives_under_its_name() {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path(), &DatabaseSchema::attendance()).unwrap();
    assert_eq!(db.name(), ATTENDANCE_DB);
    assert_eq!(
        db.dir(),
        temp_dir.path().canonicalize().unwrap().join(ATTENDANCE_DB)
    );
    assert!(db.dir().join("db.json").exists());
}

// ============================================================
// Versioning
// ============================================================

#[test]
fn test_upgrade_keeps_existing_records() {
    let temp_dir = TempDir::new().unwrap();
    {
        let db = Database::open(temp_dir.path(), &DatabaseSchema::attendance()).unwrap();
        enqueue_value(&db, json!({"userId": 1})).unwrap();
    }

    let v2 = DatabaseSchema::new(ATTENDANCE_DB, 2, &[RECORDS_STORE, "outbox"]);
    let db = Database::open(temp_dir.path(), &v2).unwrap();
    assert_eq!(db.version(), 2);
    assert_eq!(count_records(&db).unwrap(), 1);
    assert!(db.object_store_names().contains(&"outbox".to_string()));
    drop(db);

    let err = Database::open(temp_dir.path(), &DatabaseSchema::attendance()).unwrap_err();
    assert!(matches!(
        err,
        RollcallError::VersionMismatch {
            requested: 1,
            existing: 2,
            ..
        }
    ));
}

#[test]
fn test_version_zero_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let schema = DatabaseSchema::new(ATTENDANCE_DB, 0, &[RECORDS_STORE]);
    let err = Database::open(temp_dir.path(), &schema).unwrap_err();
    assert!(matches!(err, RollcallError::InvalidVersion(0)));
}

// ============================================================
// Transactions
// ============================================================

#[test]
fn test_dropped_transaction_applies_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path(), &DatabaseSchema::attendance()).unwrap();
    enqueue_value(&db, json!({"userId": 1})).unwrap();

    {
        let mut tx = db
            .transaction(RECORDS_STORE, TransactionMode::ReadWrite)
            .unwrap();
        tx.delete(1).unwrap();
        tx.add(json!({"userId": 2})).unwrap();
        assert_eq!(tx.pending_len(), 2);
    }

    let records = get_all_records(&db).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key, 1);
}

#[test]
fn test_readonly_transaction_rejects_writes() {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path(), &DatabaseSchema::attendance()).unwrap();

    let mut tx = db
        .transaction(RECORDS_STORE, TransactionMode::ReadOnly)
        .unwrap();
    let err = tx.add(json!({"userId": 1})).unwrap_err();
    assert!(matches!(err, RollcallError::ReadOnlyTransaction(_)));
}

#[test]
fn test_unknown_object_store() {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path(), &DatabaseSchema::attendance()).unwrap();
    let err = db
        .transaction("grades", TransactionMode::ReadOnly)
        .unwrap_err();
    assert!(matches!(err, RollcallError::ObjectStoreNotFound(_)));
}
