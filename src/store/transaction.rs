use super::object_store::{CommitSummary, Mutation, ObjectStore};
use crate::error::{Result, RollcallError};
use crate::types::{RecordKey, StoredRecord};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

/// A transaction scoped to one object store.
///
/// Reads see committed state. Writes are buffered and only reach the store
/// when [`Transaction::commit`] succeeds; dropping the transaction discards them.
pub struct Transaction {
    store: Arc<ObjectStore>,
    mode: TransactionMode,
    pending: Vec<Mutation>,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("store", &self.store.name())
            .field("mode", &self.mode)
            .field("pending", &self.pending)
            .finish()
    }
}

impl Transaction {
    pub(crate) fn new(store: Arc<ObjectStore>, mode: TransactionMode) -> Self {
        Transaction {
            store,
            mode,
            pending: Vec::new(),
        }
    }

    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    pub fn get_all(&self) -> Result<Vec<StoredRecord>> {
        self.store.get_all()
    }

    pub fn get(&self, key: RecordKey) -> Result<Option<serde_json::Value>> {
        self.store.get(key)
    }

    pub fn count(&self) -> Result<usize> {
        self.store.count()
    }

    /// Queue a value for insertion under the next generated key.
    pub fn add(&mut self, value: serde_json::Value) -> Result<()> {
        self.ensure_writable()?;
        self.pending.push(Mutation::Add(value));
        Ok(())
    }

    /// Queue removal of `key`. Missing keys are not an error.
    pub fn delete(&mut self, key: RecordKey) -> Result<()> {
        self.ensure_writable()?;
        self.pending.push(Mutation::Delete(key));
        Ok(())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Apply every queued write atomically.
    pub fn commit(self) -> Result<CommitSummary> {
        if self.pending.is_empty() {
            return Ok(CommitSummary::default());
        }
        self.store.commit(self.pending)
    }

    fn ensure_writable(&self) -> Result<()> {
        match self.mode {
            TransactionMode::ReadWrite => Ok(()),
            TransactionMode::ReadOnly => Err(RollcallError::ReadOnlyTransaction(
                self.store.name().to_string(),
            )),
        }
    }
}
