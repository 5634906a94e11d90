//! # Reconciliation Engine
//!
//! Mirrors the provider's firms and offices into the local database.
//!
//! ## Overview
//!
//! One call to [`ReconciliationEngine::synchronize`] is one run:
//!
//! 1. compute the fetch window from the stored watermark
//! 2. fetch the provider dataset for that window
//! 3. drop inconsistent provider rows ([`integrity`](crate::integrity))
//! 4. diff against the local mirror ([`diff`](crate::diff))
//! 5. apply the plan step by step ([`apply`](crate::apply))
//! 6. move the watermark forward if nothing failed
//!
//! Shutdown is honoured before steps 1 and 2 only. A transport failure ends
//! the run before anything is written and leaves the watermark untouched.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let engine = Arc::new(ReconciliationEngine::new(pool, provider, clock, settings.window));
//! let result = engine.synchronize(&shutdown).await?;
//! println!("{} firms created", result.counts.firms_created);
//! ```

use bridge_traits::provider::{ProviderClient, ProviderDataset};
use bridge_traits::time::Clock;
use core_library::models::SyncMetadata;
use core_runtime::config::WindowSettings;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::apply::{Applier, Repositories};
use crate::diff::{self, LocalState, SyncPreview};
use crate::integrity;
use crate::result::{SyncResult, SyncResultBuilder};
use crate::state::{RunState, RunStateMachine};
use crate::window::FetchWindow;
use crate::{Result, SyncError};

pub struct ReconciliationEngine {
    pool: SqlitePool,
    provider: Arc<dyn ProviderClient>,
    clock: Arc<dyn Clock>,
    window: WindowSettings,
    repos: Repositories,
    event_bus: Option<EventBus>,
}

impl ReconciliationEngine {
    pub fn new(
        pool: SqlitePool,
        provider: Arc<dyn ProviderClient>,
        clock: Arc<dyn Clock>,
        window: WindowSettings,
    ) -> Self {
        Self {
            pool,
            provider,
            clock,
            window,
            repos: Repositories::sqlite(),
            event_bus: None,
        }
    }

    pub fn with_repositories(mut self, repos: Repositories) -> Self {
        self.repos = repos;
        self
    }

    /// Publish sync events on `event_bus`.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Run one reconciliation.
    ///
    /// Returns `Ok` for aborted runs and for runs where an apply step failed;
    /// the latter carry the failure in [`SyncResult::errors`].
    ///
    /// # Errors
    ///
    /// - [`SyncError::Transport`] when the provider call fails or returns no
    ///   offices. Nothing is written.
    /// - [`SyncError::Database`] when the watermark or local state cannot be read.
    #[instrument(skip(self, shutdown))]
    pub async fn synchronize(&self, shutdown: &CancellationToken) -> Result<SyncResult> {
        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let mut run = RunStateMachine::new(run_id.clone());
        let mut result = SyncResultBuilder::new(run_id.clone());

        if shutdown.is_cancelled() {
            return self.abort(run, result);
        }

        let now = self.clock.now();
        let metadata = {
            let mut conn = self.pool.acquire().await?;
            self.repos.metadata.load(&mut conn).await?
        };
        let window = FetchWindow::compute(metadata.as_ref(), now, &self.window);
        run.transition(RunState::FetchWindowComputed)?;
        result.set_window(window);

        if shutdown.is_cancelled() {
            return self.abort(run, result);
        }

        info!(run_id = %run_id, window = %window, "Starting provider sync");
        self.emit(SyncEvent::Started {
            run_id: run_id.clone(),
            window_from: window.from.to_rfc3339(),
            window_to: window.to.to_rfc3339(),
        });

        run.transition(RunState::Fetching)?;
        let dataset = match self.fetch(window).await {
            Ok(dataset) => dataset,
            Err(e) => return Err(self.fail(&mut run, e)),
        };

        run.transition(RunState::Diffing)?;
        let mut warnings = Vec::new();
        let dataset = integrity::check(dataset, &mut warnings);
        result.extend_warnings(warnings);

        let local = match self.load_local().await {
            Ok(local) => local,
            Err(e) => return Err(self.fail(&mut run, e)),
        };
        let plan = diff::plan(&dataset, &local);
        result.extend_warnings(plan.warnings.iter().cloned());

        run.transition(RunState::Applying)?;
        if plan.errors.is_empty() {
            Applier::new(&self.pool, &self.repos, now.timestamp())
                .apply(&plan, &local, &mut result)
                .await;
        } else {
            warn!(
                errors = plan.errors.len(),
                "Provider data has records that cannot be applied; nothing written"
            );
            for message in &plan.errors {
                result.error(message.clone());
            }
        }

        if !result.has_errors() {
            let watermark = SyncMetadata {
                last_successful_from: window.from,
                last_successful_to: window.to,
                updated_at: self.clock.now(),
            };
            if let Err(e) = self.save_watermark(&watermark).await {
                result.error(format!("Failed to save sync metadata: {}", e));
            }
        }

        run.transition(RunState::Completed)?;
        let result = result.freeze();
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            run_id = %run_id,
            changes = result.counts.total(),
            warnings = result.warnings.len(),
            errors = result.errors.len(),
            duration_ms,
            "Provider sync finished"
        );
        self.emit(completed_event(&result, duration_ms));

        Ok(result)
    }

    /// Run [`synchronize`](Self::synchronize) on its own task.
    pub fn synchronize_async(
        self: &Arc<Self>,
        shutdown: CancellationToken,
    ) -> JoinHandle<Result<SyncResult>> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.synchronize(&shutdown).await })
    }

    /// Fetch and diff without writing anything.
    ///
    /// # Errors
    ///
    /// Same as [`synchronize`](Self::synchronize) for the fetch and load phases.
    #[instrument(skip(self))]
    pub async fn preview(&self) -> Result<SyncPreview> {
        let metadata = {
            let mut conn = self.pool.acquire().await?;
            self.repos.metadata.load(&mut conn).await?
        };
        let window = FetchWindow::compute(metadata.as_ref(), self.clock.now(), &self.window);

        let dataset = self.fetch(window).await?;
        let mut warnings = Vec::new();
        let dataset = integrity::check(dataset, &mut warnings);
        let local = self.load_local().await?;

        let mut plan = diff::plan(&dataset, &local);
        warnings.append(&mut plan.warnings);
        plan.warnings = warnings;

        Ok(plan.preview(window))
    }

    async fn fetch(&self, window: FetchWindow) -> Result<ProviderDataset> {
        let dataset = self
            .provider
            .fetch_firms_and_offices(window.from, window.to)
            .await?;

        if dataset.is_empty() {
            return Err(SyncError::Transport(
                "provider returned no offices".to_string(),
            ));
        }

        Ok(dataset)
    }

    async fn load_local(&self) -> Result<LocalState> {
        let mut conn = self.pool.acquire().await?;
        let firms = self.repos.firms.find_all(&mut conn).await?;
        let offices = self.repos.offices.find_all(&mut conn).await?;
        Ok(LocalState { firms, offices })
    }

    async fn save_watermark(&self, watermark: &SyncMetadata) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        self.repos.metadata.save(&mut conn, watermark).await?;
        Ok(())
    }

    fn abort(&self, mut run: RunStateMachine, mut result: SyncResultBuilder) -> Result<SyncResult> {
        run.transition(RunState::Aborted)?;
        warn!("Sync aborted - application is shutting down");
        result.abort();
        let result = result.freeze();
        self.emit(SyncEvent::Aborted {
            run_id: result.run_id.clone(),
        });
        Ok(result)
    }

    fn fail(&self, run: &mut RunStateMachine, error: SyncError) -> SyncError {
        if let Err(e) = run.transition(RunState::Failed) {
            return e;
        }
        warn!(error = %error, "Provider sync failed");
        self.emit(SyncEvent::Failed {
            run_id: run.run_id().to_string(),
            message: error.to_string(),
        });
        error
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Sync(event)).ok();
        }
    }
}

fn completed_event(result: &SyncResult, duration_ms: u64) -> SyncEvent {
    let counts = &result.counts;
    SyncEvent::Completed {
        run_id: result.run_id.clone(),
        firms_created: counts.firms_created,
        firms_updated: counts.firms_updated,
        firms_disabled: counts.firms_disabled,
        firms_reactivated: counts.firms_reactivated,
        offices_created: counts.offices_created,
        offices_updated: counts.offices_updated,
        offices_removed: counts.offices_deleted + counts.offices_deactivated,
        offices_reactivated: counts.offices_reactivated,
        warnings: result.warnings.len() as u64,
        errors: result.errors.len() as u64,
        duration_ms,
    }
}
