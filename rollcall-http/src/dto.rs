use rollcall::StoredRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct EnqueueResponse {
    pub key: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PendingRecordsResponse {
    pub count: usize,
    pub records: Vec<StoredRecord>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterSyncRequest {
    pub tag: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterSyncResponse {
    pub tag: String,
    pub online: bool,
}

#[derive(Debug, Deserialize)]
pub struct ConnectivityRequest {
    pub online: bool,
}

#[derive(Debug, Serialize)]
pub struct ConnectivityResponse {
    pub online: bool,
    /// Registrations started by this change
    pub fired: usize,
}

#[derive(Debug, Deserialize)]
pub struct SyncEventRequest {
    pub tag: String,
    #[serde(default, rename = "lastChance")]
    pub last_chance: bool,
}
