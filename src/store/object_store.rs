use crate::error::{Result, RollcallError};
use crate::types::{RecordKey, StoredRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Below this many logged operations the log is never compacted.
const COMPACT_MIN_OPS: usize = 1024;
/// Compact once the log holds this many operations per live record.
const COMPACT_RATIO: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum LogOp {
    Put {
        key: RecordKey,
        value: serde_json::Value,
    },
    Delete {
        key: RecordKey,
    },
}

/// One line of the store log. A whole commit is a single line, so a torn
/// write at the tail is dropped as a unit on replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CommitEntry {
    timestamp_ms: u64,
    next_key: RecordKey,
    ops: Vec<LogOp>,
}

/// A buffered write applied on commit.
#[derive(Debug, Clone)]
pub(crate) enum Mutation {
    Add(serde_json::Value),
    Delete(RecordKey),
}

/// What a commit did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Keys assigned to added values, in the order they were added.
    pub added: Vec<RecordKey>,
    /// Number of delete requests applied (missing keys included).
    pub deleted: usize,
}

struct StoreState {
    records: BTreeMap<RecordKey, serde_json::Value>,
    next_key: RecordKey,
    writer: BufWriter<File>,
    /// Length of the log up to the last complete commit line
    committed_len: u64,
    logged_ops: usize,
    /// Set when the log could not be repaired; commits are refused until reopen.
    failed: Option<String>,
}

/// A named collection of JSON values under auto-incrementing integer keys,
/// persisted as an append-only JSON-lines log.
pub struct ObjectStore {
    name: String,
    path: PathBuf,
    state: RwLock<StoreState>,
}

impl ObjectStore {
    pub fn open(dir: &Path, name: &str) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.jsonl", name));

        let (records, next_key, logged_ops) = Self::replay(&path)?;

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if has_torn_tail(&path)? {
            // Terminate the torn line so the next commit starts on its own line.
            file.write_all(b"\n")?;
        }
        let committed_len = file.metadata()?.len();

        tracing::debug!(
            "Opened object store {}: {} records, next key {}",
            name,
            records.len(),
            next_key
        );

        Ok(ObjectStore {
            name: name.to_string(),
            path,
            state: RwLock::new(StoreState {
                records,
                next_key,
                writer: BufWriter::new(file),
                committed_len,
                logged_ops,
                failed: None,
            }),
        })
    }

    fn replay(path: &Path) -> Result<(BTreeMap<RecordKey, serde_json::Value>, RecordKey, usize)> {
        let mut records = BTreeMap::new();
        let mut next_key: RecordKey = 1;
        let mut logged_ops = 0usize;

        if !path.exists() {
            return Ok((records, next_key, logged_ops));
        }

        let reader = BufReader::new(File::open(path)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = match serde_json::from_str::<CommitEntry>(&line) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable commit in {}: {}", path.display(), e);
                    continue;
                }
            };
            next_key = next_key.max(entry.next_key);
            logged_ops += entry.ops.len();
            for op in entry.ops {
                match op {
                    LogOp::Put { key, value } => {
                        next_key = next_key.max(key + 1);
                        records.insert(key, value);
                    }
                    LogOp::Delete { key } => {
                        records.remove(&key);
                    }
                }
            }
        }

        Ok((records, next_key, logged_ops))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| RollcallError::Poisoned(self.name.clone()))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| RollcallError::Poisoned(self.name.clone()))
    }

    /// All values in ascending key order.
    pub fn get_all(&self) -> Result<Vec<StoredRecord>> {
        let state = self.read_state()?;
        Ok(state
            .records
            .iter()
            .map(|(key, value)| StoredRecord {
                key: *key,
                value: value.clone(),
            })
            .collect())
    }

    pub fn get(&self, key: RecordKey) -> Result<Option<serde_json::Value>> {
        Ok(self.read_state()?.records.get(&key).cloned())
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.read_state()?.records.len())
    }

    /// The key the next added value will receive.
    pub fn next_key(&self) -> Result<RecordKey> {
        Ok(self.read_state()?.next_key)
    }

    /// Persist and apply a batch of mutations as one log line.
    pub(crate) fn commit(&self, mutations: Vec<Mutation>) -> Result<CommitSummary> {
        let mut summary = CommitSummary::default();
        if mutations.is_empty() {
            return Ok(summary);
        }

        let mut state = self.write_state()?;
        if let Some(reason) = &state.failed {
            return Err(RollcallError::Io(format!(
                "object store {} refuses writes until reopened: {}",
                self.name, reason
            )));
        }
        let mut next_key = state.next_key;
        let mut ops = Vec::with_capacity(mutations.len());

        for mutation in mutations {
            match mutation {
                Mutation::Add(value) => {
                    summary.added.push(next_key);
                    ops.push(LogOp::Put {
                        key: next_key,
                        value,
                    });
                    next_key += 1;
                }
                Mutation::Delete(key) => {
                    summary.deleted += 1;
                    ops.push(LogOp::Delete { key });
                }
            }
        }

        let entry = CommitEntry {
            timestamp_ms: now_ms(),
            next_key,
            ops,
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        if let Err(e) = write_line(&mut state.writer, line.as_bytes()) {
            self.discard_partial_line(&mut state);
            return Err(e.into());
        }

        state.committed_len += line.len() as u64;
        state.next_key = next_key;
        state.logged_ops += entry.ops.len();
        for op in entry.ops {
            match op {
                LogOp::Put { key, value } => {
                    state.records.insert(key, value);
                }
                LogOp::Delete { key } => {
                    state.records.remove(&key);
                }
            }
        }

        if state.logged_ops >= COMPACT_MIN_OPS
            && state.logged_ops > state.records.len().max(1) * COMPACT_RATIO
        {
            // The commit is already durable; a failed rewrite only leaves the log long.
            if let Err(e) = self.compact_locked(&mut state) {
                tracing::warn!("Compaction of object store {} failed: {}", self.name, e);
            }
        }

        Ok(summary)
    }

    /// Cut the log back to the last complete commit after a failed append, so
    /// the next commit does not land on the tail of a torn line.
    fn discard_partial_line(&self, state: &mut StoreState) {
        let repaired = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .and_then(|file| {
                file.set_len(state.committed_len)?;
                Ok(file)
            });

        match repaired {
            Ok(file) => {
                let stale = std::mem::replace(&mut state.writer, BufWriter::new(file));
                // Drop the buffered bytes of the failed line without flushing them.
                let _ = stale.into_parts();
                tracing::warn!(
                    "Discarded partial commit in object store {}, log truncated to {} bytes",
                    self.name,
                    state.committed_len
                );
            }
            Err(e) => {
                tracing::error!(
                    "Could not repair log of object store {}: {}; refusing further writes",
                    self.name,
                    e
                );
                state.failed = Some(e.to_string());
            }
        }
    }

    /// Rewrite the log as a single commit holding the live records and the key
    /// generator position.
    pub fn compact(&self) -> Result<()> {
        let mut state = self.write_state()?;
        self.compact_locked(&mut state)
    }

    fn compact_locked(&self, state: &mut StoreState) -> Result<()> {
        state.writer.flush()?;

        let entry = CommitEntry {
            timestamp_ms: now_ms(),
            next_key: state.next_key,
            ops: state
                .records
                .iter()
                .map(|(key, value)| LogOp::Put {
                    key: *key,
                    value: value.clone(),
                })
                .collect(),
        };

        let mut bytes = serde_json::to_vec(&entry)?;
        bytes.push(b'\n');

        let tmp_path = self.path.with_extension("jsonl.compact");
        let written = File::create(&tmp_path).and_then(|file| {
            let mut tmp = BufWriter::new(file);
            tmp.write_all(&bytes)?;
            tmp.flush()?;
            tmp.get_ref().sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        fs::rename(&tmp_path, &self.path)?;

        // From here the current writer appends to the replaced file.
        let file = match OpenOptions::new().append(true).open(&self.path) {
            Ok(file) => file,
            Err(e) => {
                state.failed = Some(e.to_string());
                return Err(e.into());
            }
        };
        state.writer = BufWriter::new(file);
        state.committed_len = bytes.len() as u64;

        tracing::info!(
            "Compacted object store {}: {} ops -> {} records",
            self.name,
            state.logged_ops,
            state.records.len()
        );
        state.logged_ops = state.records.len();
        Ok(())
    }
}

fn write_line(writer: &mut BufWriter<File>, line: &[u8]) -> io::Result<()> {
    writer.write_all(line)?;
    writer.flush()
}

fn has_torn_tail(path: &Path) -> Result<bool> {
    use std::io::{Read, Seek, SeekFrom};

    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
