//! Background Execution and Task Scheduling
//!
//! Recurring task scheduling used by the sync scheduler.

use std::time::Duration;

use crate::error::Result;

/// Scheduled task identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Task execution status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task is scheduled but not yet running
    Scheduled,
    /// Task is currently executing
    Running,
    /// Last run completed successfully
    Completed,
    /// Last run failed
    Failed,
}

/// Background task executor trait
///
/// The executor owns the timers. Callers register the work for a task id on
/// the concrete executor first, then schedule that id here.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::background::BackgroundExecutor;
/// use std::time::Duration;
///
/// async fn schedule_sync(executor: &dyn BackgroundExecutor) -> Result<()> {
///     executor
///         .schedule_task("pda-sync", Duration::from_secs(86_400))
///         .await?;
///     Ok(())
/// }
/// ```
#[cfg_attr(any(test, feature = "test-mocks"), mockall::automock)]
#[async_trait::async_trait]
pub trait BackgroundExecutor: Send + Sync {
    /// Schedule a recurring task
    ///
    /// The first run happens one `interval` after scheduling.
    ///
    /// # Errors
    ///
    /// Returns an error if no handler is registered for `task_id`.
    async fn schedule_task(&self, task_id: &str, interval: Duration) -> Result<TaskId>;

    /// Cancel a scheduled task
    async fn cancel_task(&self, task_id: &TaskId) -> Result<()>;

    /// Get status of a task
    async fn get_task_status(&self, task_id: &TaskId) -> Result<TaskStatus>;
}
