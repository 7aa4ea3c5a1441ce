//! Background sync for queued attendance records: the sync handler, the
//! worker that receives lifecycle events, and the host-side scheduler that
//! fires and retries sync registrations.

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod scheduler;
pub mod types;
pub mod worker;

pub use config::{RetryPolicy, SyncConfig, DEFAULT_SYNC_TAG};
pub use error::SyncError;
pub use handler::SyncHandler;
pub use scheduler::SyncScheduler;
pub use types::{EventOutcome, SyncOutcome};
pub use worker::{LifecycleEvent, ServiceWorker, WorkerState};
