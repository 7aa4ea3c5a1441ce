use super::client::BackendClient;
use super::config::SyncConfig;
use super::error::SyncError;
use super::types::SyncOutcome;
use rollcall::records::{delete_records, get_all_records};
use rollcall::store::{Database, DatabaseSchema};
use rollcall::StoredRecord;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Forwards every pending attendance record to the backend in one batch and
/// removes the delivered records from the local store.
pub struct SyncHandler {
    config: SyncConfig,
    client: BackendClient,
    data_dir: PathBuf,
    schema: DatabaseSchema,
}

impl SyncHandler {
    pub fn new(config: SyncConfig, data_dir: impl Into<PathBuf>) -> Arc<Self> {
        let client = BackendClient::from_config(&config);
        Arc::new(Self {
            config,
            client,
            data_dir: data_dir.into(),
            schema: DatabaseSchema::attendance(),
        })
    }

    pub fn tag(&self) -> &str {
        &self.config.tag
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    /// Handle a sync event. Tags other than the configured one are ignored.
    pub async fn handle(&self, tag: &str) -> Result<SyncOutcome, SyncError> {
        if tag != self.config.tag {
            tracing::debug!("[SYNC] ignoring sync event with tag {}", tag);
            return Ok(SyncOutcome::Ignored);
        }
        self.sync_pending().await
    }

    /// Open the store, read all pending records, post them, and delete exactly
    /// the keys that were read once the backend accepts the batch.
    ///
    /// Nothing is deleted unless the backend answers with a 2xx status.
    pub async fn sync_pending(&self) -> Result<SyncOutcome, SyncError> {
        let data_dir = self.data_dir.clone();
        let schema = self.schema.clone();
        let (db, records) = tokio::task::spawn_blocking(
            move || -> rollcall::Result<(Database, Vec<StoredRecord>)> {
                let db = Database::open(&data_dir, &schema)?;
                let records = get_all_records(&db)?;
                Ok((db, records))
            },
        )
        .await??;

        if records.is_empty() {
            tracing::debug!("[SYNC {}] nothing to sync", self.config.tag);
            return Ok(SyncOutcome::NothingToSync);
        }

        let (keys, payloads): (Vec<_>, Vec<_>) =
            records.into_iter().map(|r| (r.key, r.value)).unzip();

        if let Err(e) = self.client.post_records(&payloads).await {
            tracing::warn!(
                "[SYNC {}] failed to sync {} records: {}",
                self.config.tag,
                payloads.len(),
                e
            );
            return Err(e);
        }

        let count = keys.len();
        let deleted = tokio::task::spawn_blocking(move || delete_records(&db, &keys)).await;
        match deleted {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                // Delivered but still queued: the next sync will send them again.
                tracing::error!(
                    "[SYNC {}] backend accepted {} records but deleting them failed: {}",
                    self.config.tag,
                    count,
                    e
                );
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!("[SYNC {}] synced {} records", self.config.tag, count);
        Ok(SyncOutcome::Synced { count })
    }
}
