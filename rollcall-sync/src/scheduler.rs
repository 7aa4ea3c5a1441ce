use super::config::RetryPolicy;
use super::error::SyncError;
use super::types::{RegistrationInfo, RegistrationState, SyncOutcome, SyncStatus};
use super::worker::ServiceWorker;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
struct Registration {
    state: RegistrationState,
    attempts: u32,
    last_error: Option<String>,
    /// Registered again while an attempt was in flight; that attempt may have
    /// read the store before the newest records were queued.
    rearmed: bool,
}

impl Registration {
    fn pending() -> Self {
        Registration {
            state: RegistrationState::Pending,
            attempts: 0,
            last_error: None,
            rearmed: false,
        }
    }
}

struct AttemptLoop {
    handle: JoinHandle<()>,
    done: watch::Receiver<bool>,
}

/// Host side of background sync: keeps one-off registrations by tag, fires
/// them when connectivity is available, and retries failures with backoff
/// until the attempt budget is spent.
pub struct SyncScheduler {
    worker: Arc<ServiceWorker>,
    policy: RetryPolicy,
    registrations: DashMap<String, Registration>,
    online: AtomicBool,
    /// At most one running attempt loop per tag
    tasks: DashMap<String, AttemptLoop>,
    /// Held for the duration of each sync invocation of a tag
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl SyncScheduler {
    pub fn new(worker: Arc<ServiceWorker>, policy: RetryPolicy) -> Arc<Self> {
        Arc::new(Self {
            worker,
            policy,
            registrations: DashMap::new(),
            online: AtomicBool::new(true),
            tasks: DashMap::new(),
            in_flight: DashMap::new(),
        })
    }

    pub fn worker(&self) -> &Arc<ServiceWorker> {
        &self.worker
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Register a one-off sync for `tag`. Fires right away when online,
    /// otherwise waits for [`SyncScheduler::set_online`].
    ///
    /// Registering a tag that is already pending keeps the existing
    /// registration. Registering while it is firing or retrying makes the
    /// running loop sync once more after it succeeds.
    pub fn register(self: &Arc<Self>, tag: &str) {
        match self.registrations.entry(tag.to_string()) {
            Entry::Occupied(mut existing) => {
                if existing.get().state != RegistrationState::Pending {
                    existing.get_mut().rearmed = true;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(Registration::pending());
            }
        }
        tracing::info!("[SYNC {}] registered", tag);

        if self.is_online() {
            self.spawn_fire(tag.to_string());
        }
    }

    /// Record a connectivity change. Coming back online fires every pending
    /// registration; returns how many were started.
    pub fn set_online(self: &Arc<Self>, online: bool) -> usize {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if !online || was_online {
            if !online && was_online {
                tracing::info!("Connectivity lost, deferring sync");
            }
            return 0;
        }

        tracing::info!("Connectivity restored, firing pending syncs");
        let pending: Vec<String> = self
            .registrations
            .iter()
            .filter(|r| r.state == RegistrationState::Pending)
            .map(|r| r.key().clone())
            .collect();

        pending
            .into_iter()
            .filter(|tag| self.spawn_fire(tag.clone()))
            .count()
    }

    pub fn registrations(&self) -> Vec<RegistrationInfo> {
        let mut infos: Vec<RegistrationInfo> = self
            .registrations
            .iter()
            .map(|r| RegistrationInfo {
                tag: r.key().clone(),
                state: r.state,
                attempts: r.attempts,
                last_error: r.last_error.clone(),
            })
            .collect();
        infos.sort_by(|a, b| a.tag.cmp(&b.tag));
        infos
    }

    pub fn status(&self) -> SyncStatus {
        let handler = self.worker.handler();
        SyncStatus {
            tag: handler.tag().to_string(),
            online: self.is_online(),
            registrations: self.registrations.len(),
            last_success: handler.client().last_success_timestamp(),
        }
    }

    /// Wait until no attempt loop is running for `tag`.
    ///
    /// The loop stays tracked while waiting, so a concurrent
    /// [`SyncScheduler::register`] cannot start a second one.
    pub async fn wait_for(&self, tag: &str) {
        let done = self.tasks.get(tag).map(|running| running.done.clone());
        if let Some(mut done) = done {
            // A dropped sender means the loop ended without signalling (panic).
            let _ = done.wait_for(|finished| *finished).await;
        }
    }

    /// Deliver one sync event for `tag` now, outside registration and retry.
    ///
    /// Waits for any in-flight invocation of the same tag, so the same batch
    /// is never posted twice concurrently.
    pub async fn dispatch_now(
        &self,
        tag: &str,
        last_chance: bool,
    ) -> Result<SyncOutcome, SyncError> {
        self.invoke(tag, last_chance).await
    }

    async fn invoke(&self, tag: &str, last_chance: bool) -> Result<SyncOutcome, SyncError> {
        let gate = Arc::clone(
            self.in_flight
                .entry(tag.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let _guard = gate.lock().await;
        self.worker.sync(tag, last_chance).await
    }

    fn spawn_fire(self: &Arc<Self>, tag: String) -> bool {
        match self.tasks.entry(tag.clone()) {
            Entry::Occupied(mut running) => {
                if !running.get().handle.is_finished() {
                    tracing::debug!("[SYNC {}] already firing", tag);
                    return false;
                }
                running.insert(self.spawn_task(tag));
            }
            Entry::Vacant(slot) => {
                slot.insert(self.spawn_task(tag));
            }
        }
        true
    }

    fn spawn_task(self: &Arc<Self>, tag: String) -> AttemptLoop {
        let scheduler = Arc::clone(self);
        let (done_tx, done) = watch::channel(false);
        let handle = tokio::spawn(async move {
            loop {
                if let Err(e) = scheduler.fire(&tag).await {
                    tracing::debug!("[SYNC {}] attempt loop ended with error: {}", tag, e);
                }
                // Untrack under the map lock, unless a registration arrived
                // that the ended loop could not pick up.
                let fire_again = match scheduler.tasks.entry(tag.clone()) {
                    Entry::Occupied(running) => {
                        let again = scheduler.should_fire(&tag);
                        if !again {
                            running.remove();
                        }
                        again
                    }
                    Entry::Vacant(_) => false,
                };
                if !fire_again {
                    break;
                }
            }
            let _ = done_tx.send(true);
        });
        AttemptLoop { handle, done }
    }

    fn should_fire(&self, tag: &str) -> bool {
        self.is_online()
            && self
                .registrations
                .get(tag)
                .map(|r| r.state == RegistrationState::Pending)
                .unwrap_or(false)
    }

    /// Run the attempt loop for a registered tag and return its final result.
    ///
    /// Success or an exhausted attempt budget drops the registration, unless
    /// it was registered again meanwhile. Losing connectivity leaves it
    /// pending for the next reconnect.
    pub async fn fire(&self, tag: &str) -> Result<SyncOutcome, SyncError> {
        loop {
            let attempt = match self.registrations.get_mut(tag) {
                Some(mut registration) => {
                    registration.state = RegistrationState::Firing;
                    registration.attempts += 1;
                    registration.attempts
                }
                None => return Ok(SyncOutcome::Ignored),
            };
            let last_chance = attempt >= self.policy.max_attempts;

            match self.invoke(tag, last_chance).await {
                Ok(outcome) => {
                    if self.finish(tag) {
                        tracing::info!("[SYNC {}] completed on attempt {}", tag, attempt);
                        return Ok(outcome);
                    }
                    tracing::info!(
                        "[SYNC {}] completed on attempt {}, registered again meanwhile",
                        tag,
                        attempt
                    );
                }
                Err(e) if last_chance => {
                    if self.finish(tag) {
                        tracing::warn!(
                            "[SYNC {}] giving up after {} attempts: {}",
                            tag,
                            attempt,
                            e
                        );
                    } else {
                        self.mark(tag, RegistrationState::Pending, Some(e.to_string()));
                        tracing::warn!(
                            "[SYNC {}] attempt budget spent, keeping newer registration",
                            tag
                        );
                    }
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.policy.delay_after(attempt);
                    tracing::warn!(
                        "[SYNC {}] attempt {} failed: {}, retrying in {:?}",
                        tag,
                        attempt,
                        e,
                        delay
                    );
                    self.mark(tag, RegistrationState::Retrying, Some(e.to_string()));

                    if self.is_online() {
                        tokio::time::sleep(delay).await;
                    }
                    if !self.is_online() {
                        self.mark(tag, RegistrationState::Pending, None);
                        return Err(e);
                    }
                }
            }
        }
    }

    /// Drop the registration unless it was registered again during the
    /// attempt; a rearmed one restarts with a fresh attempt budget.
    fn finish(&self, tag: &str) -> bool {
        if self.registrations.remove_if(tag, |_, r| !r.rearmed).is_some() {
            return true;
        }
        match self.registrations.get_mut(tag) {
            Some(mut registration) => {
                registration.rearmed = false;
                registration.attempts = 0;
                false
            }
            None => true,
        }
    }

    fn mark(&self, tag: &str, state: RegistrationState, error: Option<String>) {
        if let Some(mut registration) = self.registrations.get_mut(tag) {
            registration.state = state;
            if state == RegistrationState::Pending {
                // The next firing reads the store afresh.
                registration.rearmed = false;
            }
            if error.is_some() {
                registration.last_error = error;
            }
        }
    }
}
