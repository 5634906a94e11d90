use std::sync::Arc;

use bridge_native::{ReqwestHttpClient, TokioBackgroundExecutor};
use bridge_traits::background::TaskId;
use bridge_traits::provider::ProviderClient;
use bridge_traits::time::{Clock, SystemClock};
use core_library::{create_pool, DatabaseConfig};
use core_lock::{LockCoordinator, SqliteLockStore};
use core_runtime::config::{ProviderSettings, SyncSettings};
use core_runtime::events::{
    CoreEvent, EventBus, EventSeverity, EventStream, RecvError, DEFAULT_EVENT_BUFFER_SIZE,
};
use core_runtime::logging::strip_path;
use core_runtime::metrics::MetricsRegistry;
use core_sync::{
    ReconciliationEngine, SyncError, SyncPreview, SyncScheduler, TickOutcome, SYNC_TASK_ID,
};
use provider_pda::{LocalSnapshotProvider, PdaConnector};
use sqlx::SqlitePool;
use tokio::sync::broadcast::Receiver;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::Result;

/// Pick the provider client for the configured mode.
///
/// A local snapshot file wins over the HTTP API when both are set.
pub fn build_provider(settings: &ProviderSettings) -> Result<Arc<dyn ProviderClient>> {
    if let Some(path) = &settings.local_file {
        info!(
            file = %strip_path(&path.to_string_lossy()),
            "Reading provider data from local file"
        );
        return Ok(Arc::new(LocalSnapshotProvider::new(path.clone())));
    }

    let http = ReqwestHttpClient::with_timeout(settings.timeout)?;
    let connector = PdaConnector::from_settings(Arc::new(http), settings)?;
    Ok(Arc::new(connector))
}

/// Running reconciliation service.
///
/// Owns the shutdown token shared by the scheduler, the engine and the lease
/// renewal task. Cancelling it (via [`shutdown`](Self::shutdown)) stops new
/// runs from fetching and stops the recurring tick.
pub struct SyncService {
    settings: SyncSettings,
    pool: SqlitePool,
    engine: Arc<ReconciliationEngine>,
    locks: Arc<LockCoordinator>,
    scheduler: Arc<SyncScheduler>,
    executor: TokioBackgroundExecutor,
    metrics: Arc<MetricsRegistry>,
    event_bus: EventBus,
    shutdown: CancellationToken,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncService {
    /// Validate settings, open the database and build the provider client.
    ///
    /// # Errors
    ///
    /// Fails on invalid settings, an unreachable database or a provider
    /// configuration that cannot produce a client.
    #[instrument(skip_all)]
    pub async fn bootstrap(settings: SyncSettings) -> Result<Self> {
        settings.validate()?;
        info!(settings = ?settings, "Bootstrapping sync service");

        let pool = create_pool(DatabaseConfig::from_url(&settings.database_url)).await?;
        let provider = build_provider(&settings.provider)?;

        Ok(Self::from_parts(
            settings,
            pool,
            provider,
            Arc::new(SystemClock),
        ))
    }

    /// Assemble a service from an open pool and an existing provider client.
    pub fn from_parts(
        settings: SyncSettings,
        pool: SqlitePool,
        provider: Arc<dyn ProviderClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let event_bus = EventBus::new(DEFAULT_EVENT_BUFFER_SIZE);
        let shutdown = CancellationToken::new();
        let metrics = Arc::new(MetricsRegistry::new());

        let locks = Arc::new(
            LockCoordinator::new(
                Arc::new(SqliteLockStore::new(pool.clone())),
                Arc::clone(&clock),
            )
            .with_event_bus(event_bus.clone()),
        );
        let engine = Arc::new(
            ReconciliationEngine::new(pool.clone(), provider, Arc::clone(&clock), settings.window)
                .with_event_bus(event_bus.clone()),
        );
        let scheduler = Arc::new(SyncScheduler::new(
            Arc::clone(&engine),
            Arc::clone(&locks),
            metrics.clone(),
            settings.scheduler,
            settings.lock.clone(),
            shutdown.clone(),
        ));

        Self {
            settings,
            pool,
            engine,
            locks,
            scheduler,
            executor: TokioBackgroundExecutor::new(),
            metrics,
            event_bus,
            shutdown,
            background: Mutex::new(Vec::new()),
        }
    }

    /// Register the sync task, start lease renewal and the event log, then
    /// schedule the tick.
    ///
    /// Returns once the tick is scheduled; a startup run continues in the
    /// background. Returns `None` when the scheduler is disabled in settings.
    pub async fn start(&self) -> Result<Option<TaskId>> {
        if self.shutdown.is_cancelled() {
            return Err(SyncError::Cancelled.into());
        }

        self.executor
            .register_task_handler(SYNC_TASK_ID, self.scheduler.task_handler())
            .await?;

        {
            let mut background = self.background.lock().await;
            if background.is_empty() {
                background.push(self.locks.spawn_lease_renewal(
                    self.settings.lock.renewal_interval,
                    self.shutdown.clone(),
                ));
                background.push(self.spawn_event_log());
            }
        }

        Ok(self.scheduler.start(&self.executor).await?)
    }

    /// Run one sync immediately, under the same lock and metrics as a tick.
    pub async fn sync_now(&self) -> TickOutcome {
        self.scheduler.scheduled_sync().await
    }

    /// Compute what the next run would change without writing anything.
    pub async fn preview(&self) -> Result<SyncPreview> {
        Ok(self.engine.preview().await?)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    pub fn metrics(&self) -> Arc<MetricsRegistry> {
        Arc::clone(&self.metrics)
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Token that aborts runs before their fetch step when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop the tick, wait for runs in progress and background tasks, then
    /// close the pool.
    ///
    /// A run already past its fetch step commits and releases its lock
    /// before the pool closes.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down sync service");
        self.shutdown.cancel();
        self.scheduler.stop(&self.executor).await?;
        self.scheduler.wait_idle().await;

        let handles: Vec<_> = self.background.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }

        self.pool.close().await;
        info!("Sync service stopped");
        Ok(())
    }

    /// Mirror bus events of info severity and above into the log.
    fn spawn_event_log(&self) -> JoinHandle<()> {
        let mut stream = EventStream::new(self.event_bus.subscribe())
            .filter(|event| event.severity() >= EventSeverity::Info);
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    received = stream.recv() => match received {
                        Ok(event) => log_event(&event),
                        Err(RecvError::Lagged(missed)) => {
                            warn!(missed, "Event log fell behind");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        })
    }
}

fn log_event(event: &CoreEvent) {
    match event.severity() {
        EventSeverity::Error => error!(event = ?event, "{}", event.description()),
        EventSeverity::Warning => warn!(event = ?event, "{}", event.description()),
        _ => info!(event = ?event, "{}", event.description()),
    }
}
