use super::error::SyncError;
use super::handler::SyncHandler;
use super::types::{EventOutcome, SyncOutcome};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Registered but not installed yet.
    Parsed,
    /// Installed and not waiting on older workers.
    Installed,
    /// Active; receives sync events.
    Activated,
}

/// Events the host delivers to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Install,
    Activate,
    Sync {
        tag: String,
        /// Set by the host on the final attempt before it gives up.
        #[serde(default, rename = "lastChance")]
        last_chance: bool,
    },
}

pub struct ServiceWorker {
    handler: Arc<SyncHandler>,
    state: Mutex<WorkerState>,
    controlling: AtomicBool,
}

impl ServiceWorker {
    pub fn new(handler: Arc<SyncHandler>) -> Arc<Self> {
        Arc::new(Self {
            handler,
            state: Mutex::new(WorkerState::Parsed),
            controlling: AtomicBool::new(false),
        })
    }

    pub fn handler(&self) -> &Arc<SyncHandler> {
        &self.handler
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the worker has claimed the open clients.
    pub fn is_controlling(&self) -> bool {
        self.controlling.load(Ordering::SeqCst)
    }

    pub async fn dispatch(&self, event: LifecycleEvent) -> Result<EventOutcome, SyncError> {
        match event {
            LifecycleEvent::Install => {
                self.skip_waiting();
                Ok(EventOutcome::Installed)
            }
            LifecycleEvent::Activate => {
                self.claim_clients();
                Ok(EventOutcome::Activated)
            }
            LifecycleEvent::Sync { tag, last_chance } => {
                self.sync(&tag, last_chance).await.map(EventOutcome::Sync)
            }
        }
    }

    pub async fn sync(&self, tag: &str, last_chance: bool) -> Result<SyncOutcome, SyncError> {
        if last_chance {
            tracing::info!("[SYNC {}] final attempt before the host gives up", tag);
        }
        self.handler.handle(tag).await
    }

    /// Become ready to activate without waiting for older workers.
    fn skip_waiting(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == WorkerState::Parsed {
            *state = WorkerState::Installed;
        }
        tracing::info!("Worker installed, skipping wait");
    }

    /// Take control of every open client immediately.
    fn claim_clients(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = WorkerState::Activated;
        self.controlling.store(true, Ordering::SeqCst);
        tracing::info!("Worker activated and controlling clients");
    }
}
