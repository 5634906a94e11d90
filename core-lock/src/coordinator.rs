//! # Lease Lock Coordinator
//!
//! Named mutual exclusion across every process sharing one database.
//!
//! ## Overview
//!
//! Each `LockCoordinator` carries a random instance id. [`LockCoordinator::with_lock`]
//! makes exactly one conditional write to take the lease for a key, runs the
//! task, and deletes the row afterwards. Contention fails fast with
//! [`LockError::AcquisitionFailed`]; retrying is up to the caller.
//!
//! Leases expire on their own if the process dies. While work is running,
//! [`LockCoordinator::spawn_lease_renewal`] keeps pushing the expiry of every
//! lease this instance still holds.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let coordinator = Arc::new(LockCoordinator::new(store, clock));
//! let renewal = coordinator.spawn_lease_renewal(Duration::from_secs(200), shutdown.clone());
//!
//! match coordinator.with_lock("pda-sync", Duration::from_secs(600), || engine.synchronize(&shutdown)).await {
//!     Ok(result) => { /* the task's own output */ }
//!     Err(LockError::AcquisitionFailed { .. }) => { /* someone else is running it */ }
//!     Err(e) => return Err(e.into()),
//! }
//! ```
//!
//! If the future returned by `with_lock` is dropped before it finishes, the
//! row is not deleted and the lease runs out at its expiry instead.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bridge_traits::time::Clock;
use core_runtime::events::{CoreEvent, EventBus, LockEvent};
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{LockError, Result};
use crate::store::LockStore;

pub struct LockCoordinator {
    store: Arc<dyn LockStore>,
    clock: Arc<dyn Clock>,
    instance_id: String,
    /// Keys this instance holds, with the lease length each was taken for
    held: Mutex<HashMap<String, Duration>>,
    event_bus: Option<EventBus>,
}

impl LockCoordinator {
    pub fn new(store: Arc<dyn LockStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            instance_id: Uuid::new_v4().to_string(),
            held: Mutex::new(HashMap::new()),
            event_bus: None,
        }
    }

    /// Publish lock events on `event_bus`.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Random id written as `owner_id` on every lease taken by this coordinator.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Keys currently held by this instance, sorted.
    pub fn held_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.held_map().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Run `task` while holding the lease on `key`.
    ///
    /// The lease expires `timeout` after acquisition unless renewed. The
    /// task's output, including its own `Result`, is returned unchanged. The
    /// lease is released on every exit path; a panic inside the task is
    /// resumed after release.
    ///
    /// # Errors
    ///
    /// - [`LockError::AcquisitionFailed`] if another owner holds a live lease.
    ///   `task` is not run.
    /// - [`LockError::Store`] if the acquisition write itself failed.
    #[instrument(skip(self, task), fields(owner_id = %self.instance_id))]
    pub async fn with_lock<F, Fut, T>(&self, key: &str, timeout: Duration, task: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.acquire(key, timeout).await?;

        let outcome = AssertUnwindSafe(async move { task().await })
            .catch_unwind()
            .await;

        self.release(key).await;

        match outcome {
            Ok(value) => Ok(value),
            Err(panic) => {
                warn!(key, "Task panicked while holding lock; lock released");
                std::panic::resume_unwind(panic)
            }
        }
    }

    async fn acquire(&self, key: &str, timeout: Duration) -> Result<()> {
        let now = self.clock.unix_timestamp_millis();
        let expires_at = now.saturating_add(millis(timeout));

        let acquired = self
            .store
            .acquire(key, &self.instance_id, expires_at, now)
            .await?;

        if acquired == 0 {
            info!(key, "Lock held by another instance");
            self.emit(LockEvent::Contended {
                key: key.to_string(),
            });
            return Err(LockError::AcquisitionFailed {
                key: key.to_string(),
            });
        }

        self.held_map().insert(key.to_string(), timeout);
        debug!(key, expires_at, "Lock acquired");
        self.emit(LockEvent::Acquired {
            key: key.to_string(),
            owner_id: self.instance_id.clone(),
            expires_at,
        });
        Ok(())
    }

    /// Delete this instance's lease on `key`.
    ///
    /// Releasing a key held by someone else, or not held at all, does nothing.
    /// Store failures are logged; the lease then runs out on its own.
    pub async fn release(&self, key: &str) {
        self.held_map().remove(key);

        match self.store.release(key, &self.instance_id).await {
            Ok(0) => debug!(key, "Lock was no longer held by this instance"),
            Ok(_) => {
                debug!(key, "Lock released");
                self.emit(LockEvent::Released {
                    key: key.to_string(),
                });
            }
            Err(e) => warn!(key, error = %e, "Failed to release lock; lease will expire"),
        }
    }

    /// Push the expiry of every lease this instance holds.
    ///
    /// Each lease is extended by the timeout it was acquired with. A lease
    /// found to belong to someone else is dropped from the held set. Failures
    /// are logged, never returned.
    ///
    /// # Returns
    /// Number of leases extended
    pub async fn extend_leases(&self) -> usize {
        let held: Vec<(String, Duration)> = self
            .held_map()
            .iter()
            .map(|(key, timeout)| (key.clone(), *timeout))
            .collect();

        let mut extended = 0;
        for (key, timeout) in held {
            let new_expires_at = self
                .clock
                .unix_timestamp_millis()
                .saturating_add(millis(timeout));

            match self
                .store
                .extend(&key, &self.instance_id, new_expires_at)
                .await
            {
                Ok(0) => {
                    warn!(key = %key, "Lease lost; another instance may now run this work");
                    self.held_map().remove(&key);
                    self.emit(LockEvent::LeaseLost { key });
                }
                Ok(_) => {
                    debug!(key = %key, new_expires_at, "Lease extended");
                    extended += 1;
                }
                Err(e) => warn!(key = %key, error = %e, "Failed to extend lease"),
            }
        }
        extended
    }

    /// Call [`extend_leases`](Self::extend_leases) every `interval` until
    /// `shutdown` is cancelled.
    pub fn spawn_lease_renewal(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Lease renewal stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        coordinator.extend_leases().await;
                    }
                }
            }
        })
    }

    fn held_map(&self) -> std::sync::MutexGuard<'_, HashMap<String, Duration>> {
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: LockEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Lock(event)).ok();
        }
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
