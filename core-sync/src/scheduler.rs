//! # Sync Scheduler
//!
//! Fires the reconciliation engine on a fixed interval under the lease lock,
//! and records metrics for every tick.
//!
//! A tick never fails from the caller's point of view: lock contention,
//! transport errors, database errors and panics inside the run are logged,
//! counted as failures and the next interval tries again.
//!
//! Every tick, including the startup run, is tracked so shutdown can wait
//! for work in progress with [`SyncScheduler::wait_idle`].
//!
//! ## Metrics
//!
//! All tagged `source=scheduler`:
//!
//! | Name | Kind | Meaning |
//! |------|------|---------|
//! | `sync.requests` | counter | ticks started |
//! | `sync.success` | counter | runs with no errors |
//! | `sync.failure` | counter | runs with errors, or ticks that returned an error |
//! | `sync.errors` | counter | error messages recorded |
//! | `sync.firms.*`, `sync.offices.*` | counter | per-field change counts |
//! | `sync.duration` | timer | wall time of each tick |

use bridge_traits::background::{BackgroundExecutor, TaskId};
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::metrics::{MetricsSink, Tags};
use core_lock::{LockCoordinator, LockError};
use core_runtime::config::{LockSettings, SchedulerSettings};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, instrument};

use crate::engine::ReconciliationEngine;
use crate::result::SyncResult;
use crate::{Result, SyncError};

/// Id of the recurring task on the background executor
pub const SYNC_TASK_ID: &str = "provider-sync";

const TAGS: Tags<'static> = &[("source", "scheduler")];

/// What happened on one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The engine ran and returned a result, possibly with errors
    Completed(SyncResult),
    /// Another instance held the lock
    Skipped { key: String },
    /// The engine or the lock store returned an error
    Failed(String),
}

pub struct SyncScheduler {
    engine: Arc<ReconciliationEngine>,
    locks: Arc<LockCoordinator>,
    metrics: Arc<dyn MetricsSink>,
    schedule: SchedulerSettings,
    lock: LockSettings,
    shutdown: CancellationToken,
    task_id: Mutex<Option<TaskId>>,
    in_flight: TaskTracker,
}

impl SyncScheduler {
    pub fn new(
        engine: Arc<ReconciliationEngine>,
        locks: Arc<LockCoordinator>,
        metrics: Arc<dyn MetricsSink>,
        schedule: SchedulerSettings,
        lock: LockSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            engine,
            locks,
            metrics,
            schedule,
            lock,
            shutdown,
            task_id: Mutex::new(None),
            in_flight: TaskTracker::new(),
        }
    }

    /// Run one sync under the lock and record metrics. Never fails.
    pub async fn scheduled_sync(&self) -> TickOutcome {
        self.in_flight.track_future(self.tick()).await
    }

    #[instrument(skip(self), fields(lock_key = %self.lock.key))]
    async fn tick(&self) -> TickOutcome {
        self.metrics.increment_counter("sync.requests", 1, TAGS);
        let started = Instant::now();

        let run = self
            .locks
            .with_lock(&self.lock.key, self.lock.lease_timeout, || {
                self.engine.synchronize(&self.shutdown)
            });

        let outcome = match AssertUnwindSafe(run).catch_unwind().await {
            Ok(Ok(Ok(result))) => {
                self.record_result(&result);
                TickOutcome::Completed(result)
            }
            Ok(Ok(Err(e))) => {
                error!(error = %e, "Scheduled sync failed");
                self.record_failure();
                TickOutcome::Failed(e.to_string())
            }
            Ok(Err(LockError::AcquisitionFailed { key })) => {
                info!(key = %key, "Sync already running on another instance; skipping tick");
                self.record_failure();
                TickOutcome::Skipped { key }
            }
            Ok(Err(e)) => {
                let e = SyncError::from(e);
                error!(error = %e, "Could not take sync lock");
                self.record_failure();
                TickOutcome::Failed(e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(panic = %message, "Scheduled sync panicked");
                self.record_failure();
                TickOutcome::Failed(format!("Sync panicked: {}", message))
            }
        };

        self.metrics
            .record_duration("sync.duration", started.elapsed(), TAGS);
        outcome
    }

    /// Wait until no tick is running.
    ///
    /// Ticks that start while waiting are waited for too.
    pub async fn wait_idle(&self) {
        self.in_flight.close();
        self.in_flight.wait().await;
        self.in_flight.reopen();
    }

    /// Run once at startup when configured to.
    pub async fn on_application_ready(&self) -> Option<TickOutcome> {
        if !self.schedule.run_on_startup {
            return None;
        }

        info!("Running startup sync");
        Some(self.scheduled_sync().await)
    }

    /// Handler to register with the executor under [`SYNC_TASK_ID`].
    pub fn task_handler(
        self: &Arc<Self>,
    ) -> impl Fn() -> BoxFuture<'static, BridgeResult<()>> + Send + Sync + 'static {
        let scheduler = Arc::clone(self);
        move || {
            let scheduler = Arc::clone(&scheduler);
            async move {
                scheduler.scheduled_sync().await;
                Ok(())
            }
            .boxed()
        }
    }

    /// Schedule the recurring tick and spawn the startup sync if enabled.
    ///
    /// The handler for [`SYNC_TASK_ID`] must already be registered with the
    /// executor. Returns `None` when the scheduler is disabled. The startup
    /// run proceeds in the background; [`wait_idle`](Self::wait_idle) waits
    /// for it.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Cancelled`] if shutdown was already requested
    /// - [`SyncError::Scheduling`] if the executor rejects the task
    pub async fn start(
        self: &Arc<Self>,
        executor: &dyn BackgroundExecutor,
    ) -> Result<Option<TaskId>> {
        if !self.schedule.enabled {
            info!("Scheduler disabled");
            return Ok(None);
        }
        if self.shutdown.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let task_id = executor
            .schedule_task(SYNC_TASK_ID, self.schedule.interval)
            .await
            .map_err(|e| SyncError::Scheduling(e.to_string()))?;
        *self.task_id.lock().await = Some(task_id.clone());
        info!(
            interval_secs = self.schedule.interval.as_secs(),
            "Scheduled provider sync"
        );

        if self.schedule.run_on_startup {
            let scheduler = Arc::clone(self);
            self.in_flight.spawn(async move {
                scheduler.on_application_ready().await;
            });
        }
        Ok(Some(task_id))
    }

    /// Cancel the recurring tick if it was scheduled.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Scheduling`] if the executor fails to cancel.
    pub async fn stop(&self, executor: &dyn BackgroundExecutor) -> Result<()> {
        let Some(task_id) = self.task_id.lock().await.take() else {
            return Ok(());
        };

        executor
            .cancel_task(&task_id)
            .await
            .map_err(|e| SyncError::Scheduling(e.to_string()))?;
        info!("Stopped provider sync schedule");
        Ok(())
    }

    fn record_result(&self, result: &SyncResult) {
        let counts = &result.counts;
        for (name, value) in [
            ("sync.firms.created", counts.firms_created),
            ("sync.firms.updated", counts.firms_updated),
            ("sync.firms.disabled", counts.firms_disabled),
            ("sync.firms.reactivated", counts.firms_reactivated),
            ("sync.offices.created", counts.offices_created),
            ("sync.offices.updated", counts.offices_updated),
            (
                "sync.offices.deleted",
                counts.offices_deleted + counts.offices_deactivated,
            ),
            ("sync.offices.reactivated", counts.offices_reactivated),
        ] {
            self.metrics.increment_counter(name, value, TAGS);
        }

        if result.is_success() {
            self.metrics.increment_counter("sync.success", 1, TAGS);
        } else {
            self.metrics.increment_counter("sync.failure", 1, TAGS);
            self.metrics
                .increment_counter("sync.errors", result.errors.len() as u64, TAGS);
        }
    }

    fn record_failure(&self) {
        self.metrics.increment_counter("sync.failure", 1, TAGS);
        self.metrics.increment_counter("sync.errors", 1, TAGS);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
