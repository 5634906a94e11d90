//! Run outcome
//!
//! [`SyncResultBuilder`] is threaded through a run and collects counts,
//! warnings and errors. [`SyncResult`] is the frozen copy handed back to
//! callers.

use serde::{Deserialize, Serialize};

use crate::window::FetchWindow;

/// Warning recorded when shutdown short-circuits a run
pub const SHUTDOWN_WARNING: &str = "Sync aborted - application is shutting down";

/// Per-field change counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub firms_created: u64,
    pub firms_updated: u64,
    pub firms_disabled: u64,
    pub firms_reactivated: u64,
    pub offices_created: u64,
    pub offices_updated: u64,
    pub offices_deleted: u64,
    pub offices_deactivated: u64,
    pub offices_reactivated: u64,
}

impl SyncCounts {
    pub fn total(&self) -> u64 {
        self.firms_created
            + self.firms_updated
            + self.firms_disabled
            + self.firms_reactivated
            + self.offices_created
            + self.offices_updated
            + self.offices_deleted
            + self.offices_deactivated
            + self.offices_reactivated
    }

    /// Add another tally into this one
    pub fn merge(&mut self, other: &SyncCounts) {
        self.firms_created += other.firms_created;
        self.firms_updated += other.firms_updated;
        self.firms_disabled += other.firms_disabled;
        self.firms_reactivated += other.firms_reactivated;
        self.offices_created += other.offices_created;
        self.offices_updated += other.offices_updated;
        self.offices_deleted += other.offices_deleted;
        self.offices_deactivated += other.offices_deactivated;
        self.offices_reactivated += other.offices_reactivated;
    }
}

/// Immutable summary of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub run_id: String,
    #[serde(flatten)]
    pub counts: SyncCounts,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    /// `None` when the run was aborted before a window was computed
    pub window: Option<FetchWindow>,
    pub aborted: bool,
}

impl SyncResult {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_changes(&self) -> bool {
        self.counts.total() > 0
    }
}

/// Mutable accumulator used while a run is in progress
#[derive(Debug, Clone)]
pub struct SyncResultBuilder {
    run_id: String,
    counts: SyncCounts,
    warnings: Vec<String>,
    errors: Vec<String>,
    window: Option<FetchWindow>,
    aborted: bool,
}

impl SyncResultBuilder {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            counts: SyncCounts::default(),
            warnings: Vec::new(),
            errors: Vec::new(),
            window: None,
            aborted: false,
        }
    }

    pub fn counts(&self) -> &SyncCounts {
        &self.counts
    }

    pub fn counts_mut(&mut self) -> &mut SyncCounts {
        &mut self.counts
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn extend_warnings(&mut self, warnings: impl IntoIterator<Item = String>) {
        self.warnings.extend(warnings);
    }

    pub fn set_window(&mut self, window: FetchWindow) {
        self.window = Some(window);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Mark the run as short-circuited by shutdown.
    pub fn abort(&mut self) {
        self.aborted = true;
        self.warn(SHUTDOWN_WARNING);
    }

    pub fn freeze(self) -> SyncResult {
        SyncResult {
            run_id: self.run_id,
            counts: self.counts,
            warnings: self.warnings,
            errors: self.errors,
            window: self.window,
            aborted: self.aborted,
        }
    }
}
