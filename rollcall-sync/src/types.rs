use serde::{Deserialize, Serialize};

/// Result of handling one sync event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The event carried a tag this worker does not handle.
    Ignored,
    /// The store was empty; no request was made.
    NothingToSync,
    /// `count` records were delivered and removed from the store.
    Synced { count: usize },
}

/// Result of dispatching any lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventOutcome {
    Installed,
    Activated,
    Sync(SyncOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    /// Waiting for connectivity.
    Pending,
    /// A sync event is being handled.
    Firing,
    /// The last attempt failed; waiting out the backoff delay.
    Retrying,
}

/// Snapshot of one sync registration, for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationInfo {
    pub tag: String,
    pub state: RegistrationState,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Basic sync status for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    pub tag: String,
    pub online: bool,
    pub registrations: usize,
    pub last_success: u64, // Unix timestamp in seconds, 0 if never
}
