//! # Provider Sync Module
//!
//! Reconciles the local firm/office mirror with the Provider Data API.
//!
//! ## Overview
//!
//! This module manages:
//! - Computing a bounded fetch window from the last successful run
//! - Cleaning the provider dataset before it is compared
//! - Diffing provider data against the local mirror
//! - Applying the result in per-step transactions
//! - Running all of the above on a schedule under a lease lock
//!
//! ## Components
//!
//! - **Run State Machine** (`state`): Validated lifecycle of a single run
//! - **Fetch Window** (`window`): Watermark based window with a cap
//! - **Integrity Checks** (`integrity`): Duplicate, orphan and empty-firm filtering
//! - **Diff** (`diff`): Pure comparison producing a `SyncPlan`
//! - **Apply** (`apply`): Transactional writes of a plan
//! - **Reconciliation Engine** (`engine`): Orchestrates one run
//! - **Scheduler** (`scheduler`): Interval ticks, locking and metrics

pub mod apply;
pub mod diff;
pub mod engine;
pub mod error;
pub mod integrity;
pub mod result;
pub mod scheduler;
pub mod state;
pub mod window;

pub use apply::Repositories;
pub use diff::{equivalent, LocalState, SyncPlan, SyncPreview};
pub use engine::ReconciliationEngine;
pub use error::{Result, SyncError};
pub use result::{SyncCounts, SyncResult, SyncResultBuilder, SHUTDOWN_WARNING};
pub use scheduler::{SyncScheduler, TickOutcome, SYNC_TASK_ID};
pub use state::{RunState, RunStateMachine};
pub use window::FetchWindow;
