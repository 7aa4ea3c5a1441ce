use super::object_store::ObjectStore;
use super::transaction::{Transaction, TransactionMode};
use crate::error::{Result, RollcallError};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Databases currently open in this process, so every handle to the same
/// directory shares one set of object stores.
static OPEN_DATABASES: Lazy<Mutex<HashMap<PathBuf, Weak<DatabaseInner>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Name, version and object stores a caller expects a database to have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSchema {
    pub name: String,
    pub version: u32,
    pub object_stores: Vec<String>,
}

impl DatabaseSchema {
    pub fn new(name: impl Into<String>, version: u32, object_stores: &[&str]) -> Self {
        DatabaseSchema {
            name: name.into(),
            version,
            object_stores: object_stores.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// `AttendanceDB` version 1 with its single `records` store.
    pub fn attendance() -> Self {
        Self::new(super::ATTENDANCE_DB, super::ATTENDANCE_DB_VERSION, &[super::RECORDS_STORE])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DatabaseMeta {
    name: String,
    version: u32,
    object_stores: Vec<String>,
}

struct DatabaseInner {
    name: String,
    version: u32,
    dir: PathBuf,
    stores: HashMap<String, Arc<ObjectStore>>,
    /// Set when an open at a newer version supersedes this connection.
    closed: AtomicBool,
}

/// Handle to an opened database. Cloning is cheap and shares the stores.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.inner.name)
            .field("version", &self.inner.version)
            .field("dir", &self.inner.dir)
            .finish()
    }
}

impl Database {
    /// Open `{root}/{schema.name}` at exactly `schema.version`.
    ///
    /// A missing database, or one at a lower version, is upgraded: absent
    /// object stores are created and the new version is recorded.
    ///
    /// # Errors
    ///
    /// [`RollcallError::InvalidVersion`] for version 0 and
    /// [`RollcallError::VersionMismatch`] when the stored version is newer.
    pub fn open(root: &Path, schema: &DatabaseSchema) -> Result<Self> {
        if schema.version == 0 {
            return Err(RollcallError::InvalidVersion(0));
        }

        // Registry keys must not depend on how the caller spelled the path.
        let dir = root.join(&schema.name);
        fs::create_dir_all(&dir)?;
        let dir = fs::canonicalize(&dir)?;

        let mut open_databases = OPEN_DATABASES
            .lock()
            .map_err(|_| RollcallError::Poisoned(schema.name.clone()))?;
        open_databases.retain(|_, db| db.strong_count() > 0);
        let live = open_databases.get(&dir).and_then(Weak::upgrade);
        if let Some(live) = &live {
            if live.version == schema.version {
                return Ok(Database {
                    inner: Arc::clone(live),
                });
            }
        }

        let meta_path = dir.join("db.json");

        let existing = if meta_path.exists() {
            let content = fs::read_to_string(&meta_path)?;
            Some(serde_json::from_str::<DatabaseMeta>(&content)?)
        } else {
            None
        };

        let mut store_names = match &existing {
            Some(meta) if meta.version > schema.version => {
                return Err(RollcallError::VersionMismatch {
                    name: schema.name.clone(),
                    requested: schema.version,
                    existing: meta.version,
                });
            }
            Some(meta) => meta.object_stores.clone(),
            None => Vec::new(),
        };

        let needs_upgrade = existing
            .as_ref()
            .map(|meta| meta.version < schema.version)
            .unwrap_or(true);

        if needs_upgrade {
            for store in &schema.object_stores {
                if !store_names.contains(store) {
                    store_names.push(store.clone());
                }
            }
            let meta = DatabaseMeta {
                name: schema.name.clone(),
                version: schema.version,
                object_stores: store_names.clone(),
            };
            let tmp_path = dir.join("db.json.tmp");
            fs::write(&tmp_path, serde_json::to_vec_pretty(&meta)?)?;
            fs::rename(&tmp_path, &meta_path)?;
            tracing::info!(
                "Upgraded database {} from version {} to {}",
                schema.name,
                existing.as_ref().map(|m| m.version).unwrap_or(0),
                schema.version
            );
        }

        let mut stores = HashMap::new();
        for store_name in store_names {
            let shared = live
                .as_ref()
                .and_then(|db| db.stores.get(&store_name))
                .map(Arc::clone);
            let store = match shared {
                Some(store) => store,
                None => Arc::new(ObjectStore::open(&dir, &store_name)?),
            };
            stores.insert(store_name, store);
        }

        let inner = Arc::new(DatabaseInner {
            name: schema.name.clone(),
            version: schema.version,
            dir: dir.clone(),
            stores,
            closed: AtomicBool::new(false),
        });
        if let Some(superseded) = &live {
            superseded.closed.store(true, Ordering::SeqCst);
            tracing::info!(
                "Closed connection to {} version {} for version {}",
                schema.name,
                superseded.version,
                schema.version
            );
        }
        open_databases.insert(dir, Arc::downgrade(&inner));

        Ok(Database { inner })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn version(&self) -> u32 {
        self.inner.version
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    pub fn object_store_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.stores.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether a newer version of this database has been opened since.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Start a transaction against one object store.
    ///
    /// Fails with [`RollcallError::DatabaseClosed`] once the database has been
    /// opened at a newer version.
    pub fn transaction(&self, store: &str, mode: TransactionMode) -> Result<Transaction> {
        if self.is_closed() {
            return Err(RollcallError::DatabaseClosed {
                name: self.inner.name.clone(),
                version: self.inner.version,
            });
        }
        let object_store = self
            .inner
            .stores
            .get(store)
            .ok_or_else(|| RollcallError::ObjectStoreNotFound(store.to_string()))?;
        Ok(Transaction::new(Arc::clone(object_store), mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_attendance_schema() {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(tmp.path(), &DatabaseSchema::attendance()).unwrap();

        assert_eq!(db.name(), "AttendanceDB");
        assert_eq!(db.version(), 1);
        assert_eq!(db.object_store_names(), vec!["records".to_string()]);
        assert!(tmp.path().join("AttendanceDB").join("db.json").exists());
    }

    #[test]
    fn test_version_zero_rejected() {
        let tmp = TempDir::new().unwrap();
        let schema = DatabaseSchema::new("AttendanceDB", 0, &["records"]);
        assert!(matches!(
            Database::open(tmp.path(), &schema),
            Err(RollcallError::InvalidVersion(0))
        ));
    }

    #[test]
    fn test_newer_stored_version_rejected() {
        let tmp = TempDir::new().unwrap();
        Database::open(tmp.path(), &DatabaseSchema::new("AttendanceDB", 2, &["records"]))
            .unwrap();

        let err = Database::open(tmp.path(), &DatabaseSchema::attendance()).unwrap_err();
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
    fn test_upgrade_adds_stores_and_keeps_data() {
        let tmp = TempDir::new().unwrap();
        {
            let db = Database::open(tmp.path(), &DatabaseSchema::attendance()).unwrap();
            let mut tx = db.transaction("records", TransactionMode::ReadWrite).unwrap();
            tx.add(json!({"id": 1})).unwrap();
            tx.commit().unwrap();
        }

        let schema = DatabaseSchema::new("AttendanceDB", 2, &["records", "outbox"]);
        let db = Database::open(tmp.path(), &schema).unwrap();
        assert_eq!(db.version(), 2);
        assert_eq!(
            db.object_store_names(),
            vec!["outbox".to_string(), "records".to_string()]
        );
        let tx = db.transaction("records", TransactionMode::ReadOnly).unwrap();
        assert_eq!(tx.count().unwrap(), 1);
    }

    #[test]
    fn test_handles_to_same_directory_share_stores() {
        let tmp = TempDir::new().unwrap();
        let first = Database::open(tmp.path(), &DatabaseSchema::attendance()).unwrap();
        let second = Database::open(tmp.path(), &DatabaseSchema::attendance()).unwrap();

        let mut tx = first.transaction("records", TransactionMode::ReadWrite).unwrap();
        tx.add(json!({"id": 1})).unwrap();
        tx.commit().unwrap();

        let mut tx = second.transaction("records", TransactionMode::ReadWrite).unwrap();
        tx.add(json!({"id": 2})).unwrap();
        let summary = tx.commit().unwrap();
        assert_eq!(summary.added, vec![2]);

        let tx = first.transaction("records", TransactionMode::ReadOnly).unwrap();
        assert_eq!(tx.count().unwrap(), 2);
    }

    #[test]
    fn test_differently_spelled_paths_share_stores() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        let plain = Database::open(tmp.path(), &DatabaseSchema::attendance()).unwrap();
        let dotted = Database::open(
            &tmp.path().join("sub").join(".."),
            &DatabaseSchema::attendance(),
        )
        .unwrap();
        assert_eq!(plain.dir(), dotted.dir());

        let mut tx = plain.transaction("records", TransactionMode::ReadWrite).unwrap();
        tx.add(json!({"id": 1})).unwrap();
        tx.commit().unwrap();

        let mut tx = dotted.transaction("records", TransactionMode::ReadWrite).unwrap();
        tx.add(json!({"id": 2})).unwrap();
        assert_eq!(tx.commit().unwrap().added, vec![2]);
    }

    #[test]
    fn test_upgrade_closes_older_connection() {
        let tmp = TempDir::new().unwrap();
        let v1 = Database::open(tmp.path(), &DatabaseSchema::attendance()).unwrap();
        let mut tx = v1.transaction("records", TransactionMode::ReadWrite).unwrap();
        tx.add(json!({"id": 1})).unwrap();
        tx.commit().unwrap();

        let v2 = Database::open(tmp.path(), &DatabaseSchema::new("AttendanceDB", 2, &["records"]))
            .unwrap();
        assert!(v1.is_closed());
        assert!(!v2.is_closed());
        assert!(matches!(
            v1.transaction("records", TransactionMode::ReadWrite),
            Err(RollcallError::DatabaseClosed { version: 1, .. })
        ));

        let tx = v2.transaction("records", TransactionMode::ReadOnly).unwrap();
        assert_eq!(tx.count().unwrap(), 1);
    }

    #[test]
    fn test_unknown_store() {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(tmp.path(), &DatabaseSchema::attendance()).unwrap();
        assert!(matches!(
            db.transaction("grades", TransactionMode::ReadOnly),
            Err(RollcallError::ObjectStoreNotFound(_))
        ));
    }

    #[test]
    fn test_readonly_transaction_refuses_writes() {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(tmp.path(), &DatabaseSchema::attendance()).unwrap();
        let mut tx = db.transaction("records", TransactionMode::ReadOnly).unwrap();
        assert!(matches!(
            tx.add(json!(1)),
            Err(RollcallError::ReadOnlyTransaction(_))
        ));
        assert!(tx.delete(1).is_err());
    }

    #[test]
    fn test_dropped_transaction_aborts() {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(tmp.path(), &DatabaseSchema::attendance()).unwrap();
        {
            let mut tx = db.transaction("records", TransactionMode::ReadWrite).unwrap();
            tx.add(json!({"id": 1})).unwrap();
            assert_eq!(tx.pending_len(), 1);
        }
        let tx = db.transaction("records", TransactionMode::ReadOnly).unwrap();
        assert_eq!(tx.count().unwrap(), 0);
    }

    #[test]
    fn test_reads_in_readwrite_see_committed_state_only() {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(tmp.path(), &DatabaseSchema::attendance()).unwrap();
        let mut tx = db.transaction("records", TransactionMode::ReadWrite).unwrap();
        tx.add(json!({"id": 1})).unwrap();
        assert_eq!(tx.count().unwrap(), 0);
        let summary = tx.commit().unwrap();
        assert_eq!(summary.added, vec![1]);
    }
}
