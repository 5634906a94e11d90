//! Background Task Execution Implementation

use async_trait::async_trait;
use bridge_traits::{
    background::{BackgroundExecutor, TaskId, TaskStatus},
    error::{BridgeError, Result},
};
use futures_util::{future::BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

type TaskHandler = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;
type TaskTable = Arc<RwLock<HashMap<TaskId, TaskInfo>>>;

/// Tokio-based background executor.
///
/// Handlers are registered by id with [`register_task_handler`] and then
/// scheduled through the [`BackgroundExecutor`] trait. A recurring task never
/// overlaps itself: the next tick waits for the running handler.
///
/// [`register_task_handler`]: TokioBackgroundExecutor::register_task_handler
pub struct TokioBackgroundExecutor {
    tasks: TaskTable,
    handlers: Arc<RwLock<HashMap<String, TaskHandler>>>,
}

struct TaskInfo {
    status: TaskStatus,
    handle: Option<JoinHandle<()>>,
    cancel: Option<oneshot::Sender<()>>,
}

impl TokioBackgroundExecutor {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a handler that will be invoked when the task executes.
    pub async fn register_task_handler<F, Fut>(&self, task_id: &str, handler: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let mut handlers = self.handlers.write().await;
        handlers.insert(task_id.to_string(), Arc::new(move || handler().boxed()));
        Ok(())
    }

    async fn handler_for(&self, task_id: &str) -> Result<TaskHandler> {
        let handlers = self.handlers.read().await;
        handlers.get(task_id).cloned().ok_or_else(|| {
            BridgeError::OperationFailed(format!("No handler registered for task: {}", task_id))
        })
    }

    /// Replaces any earlier schedule of the same id.
    async fn insert_task(&self, id: TaskId, info: TaskInfo) {
        let mut tasks = self.tasks.write().await;
        if let Some(mut previous) = tasks.insert(id, info) {
            if let Some(cancel) = previous.cancel.take() {
                let _ = cancel.send(());
            }
        }
    }

    async fn attach_handle(&self, id: &TaskId, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.write().await;
        if let Some(info) = tasks.get_mut(id) {
            info.handle = Some(handle);
        }
    }

    async fn run_handler(tasks: &TaskTable, id: &TaskId, handler: &TaskHandler) {
        {
            let mut tasks = tasks.write().await;
            if let Some(info) = tasks.get_mut(id) {
                info.status = TaskStatus::Running;
            }
        }

        let result = handler().await;

        let mut tasks = tasks.write().await;
        if let Some(info) = tasks.get_mut(id) {
            info.status = match result {
                Ok(()) => TaskStatus::Completed,
                Err(err) => {
                    warn!(task_id = %id.0, error = %err, "Background task failed");
                    TaskStatus::Failed
                }
            };
        }
    }

    async fn run_recurring_task(
        tasks: TaskTable,
        id: TaskId,
        handler: TaskHandler,
        period: Duration,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = &mut cancel_rx => {
                    debug!(task_id = %id.0, "Recurring task stopped");
                    break;
                }
                _ = ticker.tick() => {
                    Self::run_handler(&tasks, &id, &handler).await;
                }
            }
        }
    }
}

impl Default for TokioBackgroundExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackgroundExecutor for TokioBackgroundExecutor {
    async fn schedule_task(&self, task_id: &str, interval: Duration) -> Result<TaskId> {
        if interval.is_zero() {
            return Err(BridgeError::OperationFailed(format!(
                "Interval for task {} must be greater than zero",
                task_id
            )));
        }

        let id = TaskId::new(task_id);
        debug!(
            task_id = task_id,
            interval_secs = interval.as_secs(),
            "Scheduling recurring task"
        );

        let handler = self.handler_for(task_id).await?;
        let (cancel_tx, cancel_rx) = oneshot::channel();

        self.insert_task(
            id.clone(),
            TaskInfo {
                status: TaskStatus::Scheduled,
                handle: None,
                cancel: Some(cancel_tx),
            },
        )
        .await;

        let handle = tokio::spawn(Self::run_recurring_task(
            Arc::clone(&self.tasks),
            id.clone(),
            handler,
            interval,
            cancel_rx,
        ));
        self.attach_handle(&id, handle).await;

        Ok(id)
    }

    async fn cancel_task(&self, task_id: &TaskId) -> Result<()> {
        debug!(task_id = %task_id.0, "Cancelling task");

        let removed = {
            let mut tasks = self.tasks.write().await;
            tasks.remove(task_id)
        };

        match removed {
            Some(mut info) => {
                if let Some(cancel) = info.cancel.take() {
                    let _ = cancel.send(());
                }
                // A running handler finishes its current iteration; the
                // cancel signal stops the loop before the next tick.
                drop(info.handle.take());
                Ok(())
            }
            None => Err(BridgeError::OperationFailed(format!(
                "Task not found: {}",
                task_id.0
            ))),
        }
    }

    async fn get_task_status(&self, task_id: &TaskId) -> Result<TaskStatus> {
        let tasks = self.tasks.read().await;
        tasks
            .get(task_id)
            .map(|info| info.status.clone())
            .ok_or_else(|| BridgeError::OperationFailed(format!("Task not found: {}", task_id.0)))
    }
}
