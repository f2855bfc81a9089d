//! Orchestration service: the sole mutator of task status.
//!
//! Every mutation of a single task runs inside that task's lock, so the
//! load, transition, and persist steps are atomic as a unit. Executor
//! hand-over and run timeouts run on spawned tokio tasks and re-enter the
//! service through the same locked paths.

use super::locks::TaskLocks;
use super::requests::{CancelTaskRequest, CreateTaskRequest, UpdateTaskRequest};
use super::scheduler::Scheduler;
use crate::task::{
    domain::{
        CronSchedule, FlowId, NewTask, Task, TaskDomainError, TaskEvent, TaskId, TaskStatus,
        TaskTopic, TaskTransition, validate_status,
    },
    ports::{
        EventBus, ExecutionOutcome, ExecutionRequest, PageRequest, TaskExecutor, TaskRepository,
        TaskRepositoryError,
    },
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Service-level errors for task orchestration.
#[derive(Debug, Clone, Error)]
pub enum TaskOrchestrationError {
    /// Input failed validation.
    #[error(transparent)]
    Validation(TaskDomainError),

    /// The task does not exist.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// A referenced flow does not exist.
    #[error("flow not found: {0}")]
    FlowNotFound(FlowId),

    /// The requested status change is not permitted from the current status.
    #[error("invalid status transition for task {task_id}: {from} -> {to}")]
    InvalidTransition {
        /// Task the transition was requested for.
        task_id: TaskId,
        /// Status at the time of the request.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },

    /// A task with the same identifier already exists.
    #[error("task already exists: {0}")]
    Conflict(TaskId),

    /// Repository operation failed.
    #[error(transparent)]
    Repository(TaskRepositoryError),
}

impl TaskOrchestrationError {
    /// Returns whether the error reports a missing task or flow.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::FlowNotFound(_))
    }
}

impl From<TaskDomainError> for TaskOrchestrationError {
    fn from(err: TaskDomainError) -> Self {
        match err {
            TaskDomainError::InvalidTransition { task_id, from, to } => {
                Self::InvalidTransition { task_id, from, to }
            }
            other => Self::Validation(other),
        }
    }
}

impl From<TaskRepositoryError> for TaskOrchestrationError {
    fn from(err: TaskRepositoryError) -> Self {
        match err {
            TaskRepositoryError::DuplicateTask(id) => Self::Conflict(id),
            TaskRepositoryError::NotFound(id) => Self::NotFound(id),
            other => Self::Repository(other),
        }
    }
}

/// Result type for orchestration service operations.
pub type TaskOrchestrationResult<T> = Result<T, TaskOrchestrationError>;

/// Tunables for the orchestration service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestrationSettings {
    /// How long a run may stay `processing` before it is failed.
    ///
    /// `None` lets runs stay outstanding until the executor reports back.
    pub execution_timeout: Option<Duration>,
}

impl OrchestrationSettings {
    /// Sets the execution timeout.
    #[must_use]
    pub const fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }

    /// Sets the execution timeout unless one is already configured.
    #[must_use]
    pub const fn with_default_execution_timeout(mut self, timeout: Duration) -> Self {
        if self.execution_timeout.is_none() {
            self.execution_timeout = Some(timeout);
        }
        self
    }
}

#[derive(Debug)]
struct Watchdog {
    run: Option<DateTime<Utc>>,
    handle: JoinHandle<()>,
}

struct ServiceState<R, B, X, C>
where
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    events: Arc<B>,
    executor: Arc<X>,
    clock: Arc<C>,
    scheduler: Scheduler<C>,
    locks: TaskLocks,
    watchdogs: Mutex<HashMap<TaskId, Watchdog>>,
    settings: OrchestrationSettings,
}

/// Task orchestration service.
///
/// Composes the scheduler, the lifecycle state machine, and the repository,
/// event bus, and executor ports. Cloning is cheap and clones share state.
pub struct TaskOrchestrationService<R, B, X, C>
where
    R: TaskRepository + 'static,
    B: EventBus + 'static,
    X: TaskExecutor + 'static,
    C: Clock + Send + Sync + 'static,
{
    state: Arc<ServiceState<R, B, X, C>>,
}

impl<R, B, X, C> Clone for TaskOrchestrationService<R, B, X, C>
where
    R: TaskRepository + 'static,
    B: EventBus + 'static,
    X: TaskExecutor + 'static,
    C: Clock + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<R, B, X, C> TaskOrchestrationService<R, B, X, C>
where
    R: TaskRepository + 'static,
    B: EventBus + 'static,
    X: TaskExecutor + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a new orchestration service with an empty scheduler.
    #[must_use]
    pub fn new(
        repository: Arc<R>,
        events: Arc<B>,
        executor: Arc<X>,
        clock: Arc<C>,
        settings: OrchestrationSettings,
    ) -> Self {
        let scheduler = Scheduler::new(Arc::clone(&clock));
        Self {
            state: Arc::new(ServiceState {
                repository,
                events,
                executor,
                clock,
                scheduler,
                locks: TaskLocks::default(),
                watchdogs: Mutex::new(HashMap::new()),
                settings,
            }),
        }
    }

    /// Returns the scheduler owned by this service.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler<C> {
        &self.state.scheduler
    }

    pub(crate) fn clock(&self) -> &C {
        &self.state.clock
    }

    /// Returns the service settings.
    #[must_use]
    pub fn settings(&self) -> OrchestrationSettings {
        self.state.settings
    }

    /// Registers every persisted recurring task with the scheduler.
    ///
    /// Returns the number of tasks registered. Tasks whose stored schedule
    /// can no longer fire are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`TaskOrchestrationError::Repository`] when the recurring
    /// tasks cannot be listed.
    pub async fn start(&self) -> TaskOrchestrationResult<usize> {
        let recurring = self.state.repository.list_recurring().await?;
        let mut registered = 0;
        for task in &recurring {
            let Some(schedule) = task.cron_schedule() else {
                continue;
            };
            match self
                .state
                .scheduler
                .register_schedule(task.id(), schedule.clone())
            {
                Ok(_) => registered += 1,
                Err(err) => {
                    tracing::warn!(task_id = %task.id(), error = %err, "skipping recurring task");
                }
            }
        }
        tracing::info!(registered, "orchestration service started");
        Ok(registered)
    }

    /// Clears all schedule registrations and cancels pending run timeouts.
    pub fn shutdown(&self) {
        self.state.scheduler.clear();
        let drained: Vec<Watchdog> = self.watchdogs().drain().map(|(_, dog)| dog).collect();
        for watchdog in drained {
            watchdog.handle.abort();
        }
        tracing::info!("orchestration service stopped");
    }

    /// Creates a new pending task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskOrchestrationError::Validation`] for blank required
    /// fields, an invalid or non-pending status, or a malformed cron
    /// expression; [`TaskOrchestrationError::FlowNotFound`] when the author
    /// or assignee flow does not exist; and
    /// [`TaskOrchestrationError::Conflict`] or
    /// [`TaskOrchestrationError::Repository`] when persistence fails. Nothing
    /// is persisted on error.
    pub async fn create(&self, request: CreateTaskRequest) -> TaskOrchestrationResult<Task> {
        let status = validate_status(request.status.as_deref().unwrap_or_default())?;
        if status != TaskStatus::Pending {
            return Err(TaskDomainError::InitialStatusNotPending(status).into());
        }
        let cron_schedule = request
            .cron_expression
            .as_deref()
            .filter(|expression| !expression.trim().is_empty())
            .map(CronSchedule::parse)
            .transpose()?;

        let task = Task::new(
            NewTask {
                title: request.title,
                description: request.description,
                category: request.category,
                attachments: request.attachments,
                author_id: request.author_id,
                assignee_id: request.assignee_id,
                state: request.state,
                input_request: request.input_request,
                cron_schedule,
            },
            &*self.state.clock,
        )?;

        self.require_flow(task.author_id()).await?;
        if task.assignee_id() != task.author_id() {
            self.require_flow(task.assignee_id()).await?;
        }

        self.state.repository.store(&task).await?;
        if let Some(schedule) = task.cron_schedule() {
            let registered = self
                .state
                .scheduler
                .register_schedule(task.id(), schedule.clone());
            if let Err(err) = registered {
                self.state.repository.delete(task.id()).await?;
                return Err(err.into());
            }
        }

        tracing::info!(task_id = %task.id(), recurring = task.is_recurring(), "task created");
        self.publish(TaskTopic::Created, &task).await;
        Ok(task)
    }

    /// Retrieves a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskOrchestrationError::NotFound`] when the task does not
    /// exist.
    pub async fn get(&self, task_id: TaskId) -> TaskOrchestrationResult<Task> {
        self.find_or_error(task_id).await
    }

    /// Returns one page of tasks, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`TaskOrchestrationError::Repository`] when the listing fails.
    pub async fn list(&self, page: PageRequest) -> TaskOrchestrationResult<Vec<Task>> {
        Ok(self.state.repository.list(page).await?)
    }

    /// Returns every task currently in `status`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskOrchestrationError::Repository`] when the listing fails.
    pub async fn list_by_status(&self, status: TaskStatus) -> TaskOrchestrationResult<Vec<Task>> {
        Ok(self.state.repository.list_by_status(status).await?)
    }

    /// Returns every task authored by `flow_id`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskOrchestrationError::Repository`] when the listing fails.
    pub async fn list_for_flow(&self, flow_id: FlowId) -> TaskOrchestrationResult<Vec<Task>> {
        Ok(self.state.repository.list_by_author(flow_id).await?)
    }

    /// Moves a pending task to `processing` and hands it to the executor.
    ///
    /// The executor is invoked on a spawned task; this call does not wait for
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`TaskOrchestrationError::NotFound`] for an unknown task and
    /// [`TaskOrchestrationError::InvalidTransition`] when the task is not
    /// pending.
    pub async fn dispatch(&self, task_id: TaskId) -> TaskOrchestrationResult<Task> {
        let _guard = self.state.locks.acquire(task_id).await;
        let mut task = self.find_or_error(task_id).await?;
        self.transition(&mut task, TaskTransition::Dispatch)?;
        self.launch(&task).await?;
        Ok(task)
    }

    /// Records a successful run.
    ///
    /// # Errors
    ///
    /// Returns [`TaskOrchestrationError::NotFound`] for an unknown task and
    /// [`TaskOrchestrationError::InvalidTransition`] when the task is not
    /// processing.
    pub async fn complete(&self, task_id: TaskId, result: Value) -> TaskOrchestrationResult<Task> {
        self.finish(task_id, TaskTransition::Complete(result), TaskTopic::Completed)
            .await
    }

    /// Records a failed run.
    ///
    /// # Errors
    ///
    /// Returns [`TaskOrchestrationError::NotFound`] for an unknown task and
    /// [`TaskOrchestrationError::InvalidTransition`] when the task is not
    /// processing.
    pub async fn fail(&self, task_id: TaskId, result: Value) -> TaskOrchestrationResult<Task> {
        self.finish(task_id, TaskTransition::Fail(result), TaskTopic::Failed)
            .await
    }

    /// Applies an outcome reported by the executor.
    ///
    /// Duplicate or late callbacks are logged and absorbed, returning
    /// `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskOrchestrationError::NotFound`] for an unknown task and
    /// [`TaskOrchestrationError::Repository`] when persistence fails.
    pub async fn report(
        &self,
        task_id: TaskId,
        outcome: ExecutionOutcome,
    ) -> TaskOrchestrationResult<Option<Task>> {
        let finished = match outcome {
            ExecutionOutcome::Succeeded(result) => self.complete(task_id, result).await,
            ExecutionOutcome::Failed(result) => self.fail(task_id, result).await,
        };
        match finished {
            Ok(task) => Ok(Some(task)),
            Err(TaskOrchestrationError::InvalidTransition { from, to, .. }) => {
                tracing::warn!(%task_id, %from, %to, "ignoring stale executor callback");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Applies a partial update.
    ///
    /// Descriptive fields are replaced directly. A status change is routed
    /// through the lifecycle state machine; moving a task to `processing`
    /// this way hands it to the executor just like [`Self::dispatch`].
    ///
    /// # Errors
    ///
    /// Returns [`TaskOrchestrationError::Validation`] for blank replacements,
    /// an invalid status literal, or a result without a terminal status;
    /// [`TaskOrchestrationError::NotFound`] for an unknown task;
    /// [`TaskOrchestrationError::FlowNotFound`] when a reassigned flow does
    /// not exist; and
    /// [`TaskOrchestrationError::InvalidTransition`] when the status change
    /// is not permitted.
    pub async fn update(
        &self,
        task_id: TaskId,
        request: UpdateTaskRequest,
    ) -> TaskOrchestrationResult<Task> {
        let UpdateTaskRequest {
            revision,
            status,
            result,
        } = request;
        let target = status.as_deref().map(validate_status).transpose()?;
        if result.is_some() && !target.is_some_and(TaskStatus::is_terminal) {
            return Err(TaskDomainError::ResultRequiresTerminalStatus.into());
        }
        for flow_id in [revision.author_id, revision.assignee_id].into_iter().flatten() {
            self.require_flow(flow_id).await?;
        }

        let _guard = self.state.locks.acquire(task_id).await;
        let mut task = self.find_or_error(task_id).await?;
        let from = task.status();
        let transition = match target {
            None => None,
            Some(to) if to == from && result.is_none() => None,
            Some(to) => Some(
                TaskTransition::towards(from, to, result)
                    .ok_or(TaskOrchestrationError::InvalidTransition { task_id, from, to })?,
            ),
        };
        if revision.is_empty() && transition.is_none() {
            return Ok(task);
        }

        if !revision.is_empty() {
            task.revise(revision, &*self.state.clock)?;
        }
        let topic = transition
            .as_ref()
            .and_then(|transition| TaskTopic::for_status(transition.target()));
        let dispatching = matches!(transition, Some(TaskTransition::Dispatch));
        if let Some(transition) = transition {
            self.transition(&mut task, transition)?;
        }

        self.persist(&task).await?;
        self.publish(TaskTopic::Updated, &task).await;
        if let Some(topic) = topic {
            self.publish(topic, &task).await;
        }
        if dispatching {
            self.hand_over(&task);
        }
        Ok(task)
    }

    /// Cancels a pending or processing task.
    ///
    /// The task moves to `failed` with a cancellation result. Unless the
    /// request keeps the schedule, a recurring task stops recurring. A
    /// running executor is not interrupted; its eventual callback is
    /// absorbed by [`Self::report`].
    ///
    /// # Errors
    ///
    /// Returns [`TaskOrchestrationError::NotFound`] for an unknown task and
    /// [`TaskOrchestrationError::InvalidTransition`] when the task has
    /// already finished.
    pub async fn cancel(
        &self,
        task_id: TaskId,
        request: CancelTaskRequest,
    ) -> TaskOrchestrationResult<Task> {
        let _guard = self.state.locks.acquire(task_id).await;
        let mut task = self.find_or_error(task_id).await?;
        self.transition(
            &mut task,
            TaskTransition::Cancel(cancellation(request.reason.as_deref())),
        )?;
        if !request.keep_schedule && task.stop_recurring(&*self.state.clock) {
            let unregistered = self.state.scheduler.unregister(task_id);
            tracing::debug!(%task_id, unregistered, "recurrence stopped by cancellation");
        }

        self.persist(&task).await?;
        self.publish(TaskTopic::Cancelled, &task).await;
        Ok(task)
    }

    /// Deletes a task, cancelling it first when it is still active.
    ///
    /// Returns the task as it was when removed.
    ///
    /// # Errors
    ///
    /// Returns [`TaskOrchestrationError::NotFound`] for an unknown task and
    /// [`TaskOrchestrationError::Repository`] when removal fails.
    pub async fn delete(&self, task_id: TaskId) -> TaskOrchestrationResult<Task> {
        let _guard = self.state.locks.acquire(task_id).await;
        let mut task = self.find_or_error(task_id).await?;
        let cancelled = task.status().is_active();
        if cancelled {
            self.transition(
                &mut task,
                TaskTransition::Cancel(cancellation(Some("deleted"))),
            )?;
        }

        self.disarm_watchdog(task_id);
        let unregistered = self.state.scheduler.unregister(task_id);
        self.state.repository.delete(task_id).await?;
        tracing::info!(%task_id, unregistered, "task deleted");

        if cancelled {
            self.publish(TaskTopic::Cancelled, &task).await;
        }
        self.publish(TaskTopic::Deleted, &task).await;
        Ok(task)
    }

    /// Fires every recurring task that is due at `now`.
    ///
    /// Finished tasks are re-armed and dispatched; pending tasks are
    /// dispatched directly; tasks with an outstanding run are skipped.
    /// Per-task failures are logged and do not stop the tick. Returns the
    /// tasks that were dispatched.
    pub async fn run_scheduler_tick(&self, now: DateTime<Utc>) -> Vec<Task> {
        let due = self.state.scheduler.tick(now);
        let mut dispatched = Vec::with_capacity(due.len());
        for task_id in due {
            match self.fire(task_id).await {
                Ok(Some(task)) => dispatched.push(task),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(%task_id, error = %err, "scheduled dispatch failed");
                }
            }
        }
        if !dispatched.is_empty() {
            tracing::debug!(count = dispatched.len(), "scheduler tick dispatched tasks");
        }
        dispatched
    }

    async fn fire(&self, task_id: TaskId) -> TaskOrchestrationResult<Option<Task>> {
        let _guard = self.state.locks.acquire(task_id).await;
        let Some(mut task) = self.state.repository.find_by_id(task_id).await? else {
            let unregistered = self.state.scheduler.unregister(task_id);
            tracing::debug!(%task_id, unregistered, "dropping schedule of missing task");
            return Ok(None);
        };
        match task.status() {
            TaskStatus::Processing => {
                tracing::debug!(%task_id, "skipping scheduled run, previous run outstanding");
                return Ok(None);
            }
            TaskStatus::Completed | TaskStatus::Failed => {
                self.transition(&mut task, TaskTransition::Rearm)?;
            }
            TaskStatus::Pending => {}
        }
        self.transition(&mut task, TaskTransition::Dispatch)?;
        self.launch(&task).await?;
        Ok(Some(task))
    }

    async fn finish(
        &self,
        task_id: TaskId,
        transition: TaskTransition,
        topic: TaskTopic,
    ) -> TaskOrchestrationResult<Task> {
        let _guard = self.state.locks.acquire(task_id).await;
        let mut task = self.find_or_error(task_id).await?;
        self.transition(&mut task, transition)?;
        self.persist(&task).await?;
        self.publish(topic, &task).await;
        Ok(task)
    }

    /// Fails the run started at `run` if it is still outstanding.
    async fn expire(&self, task_id: TaskId, run: Option<DateTime<Utc>>, result: Value) {
        let _guard = self.state.locks.acquire(task_id).await;
        let mut task = match self.state.repository.find_by_id(task_id).await {
            Ok(Some(task)) => task,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(%task_id, error = %err, "could not load task to expire run");
                return;
            }
        };
        if task.status() != TaskStatus::Processing || task.dispatched_at() != run {
            return;
        }

        let expired = match self.transition(&mut task, TaskTransition::Fail(result)) {
            Ok(()) => self.persist(&task).await,
            Err(err) => Err(err),
        };
        match expired {
            Ok(()) => self.publish(TaskTopic::Failed, &task).await,
            Err(err) => tracing::warn!(%task_id, error = %err, "could not expire run"),
        }
    }

    async fn launch(&self, task: &Task) -> TaskOrchestrationResult<()> {
        self.persist(task).await?;
        self.publish(TaskTopic::Started, task).await;
        self.hand_over(task);
        Ok(())
    }

    fn hand_over(&self, task: &Task) {
        let task_id = task.id();
        let run = task.dispatched_at();
        let request = ExecutionRequest::from(task);
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(err) = service.state.executor.invoke(request).await {
                tracing::warn!(%task_id, error = %err, "executor rejected task");
                service
                    .expire(task_id, run, json!({ "error": err.to_string() }))
                    .await;
            }
        });
        self.arm_watchdog(task_id, run);
    }

    fn arm_watchdog(&self, task_id: TaskId, run: Option<DateTime<Utc>>) {
        let Some(timeout) = self.state.settings.execution_timeout else {
            return;
        };
        let service = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            service.release_watchdog(task_id, run);
            tracing::info!(%task_id, timeout_secs = timeout.as_secs(), "run timed out");
            service
                .expire(task_id, run, json!({ "error": "timed out" }))
                .await;
        });
        if let Some(previous) = self.watchdogs().insert(task_id, Watchdog { run, handle }) {
            previous.handle.abort();
        }
    }

    /// Forgets the watchdog for `run` without aborting it.
    fn release_watchdog(&self, task_id: TaskId, run: Option<DateTime<Utc>>) {
        let mut watchdogs = self.watchdogs();
        if watchdogs.get(&task_id).is_some_and(|dog| dog.run == run) {
            watchdogs.remove(&task_id);
        }
    }

    fn disarm_watchdog(&self, task_id: TaskId) {
        let removed = self.watchdogs().remove(&task_id);
        if let Some(watchdog) = removed {
            watchdog.handle.abort();
        }
    }

    fn watchdogs(&self) -> MutexGuard<'_, HashMap<TaskId, Watchdog>> {
        self.state
            .watchdogs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(
        &self,
        task: &mut Task,
        transition: TaskTransition,
    ) -> TaskOrchestrationResult<()> {
        let from = task.status();
        task.apply(transition, &*self.state.clock)?;
        tracing::info!(task_id = %task.id(), %from, to = %task.status(), "task transitioned");
        Ok(())
    }

    async fn persist(&self, task: &Task) -> TaskOrchestrationResult<()> {
        self.state.repository.update(task).await?;
        if task.status().is_terminal() {
            self.disarm_watchdog(task.id());
        }
        Ok(())
    }

    async fn publish(&self, topic: TaskTopic, task: &Task) {
        let event = TaskEvent::new(topic, task, self.state.clock.utc());
        if let Err(err) = self.state.events.publish(event).await {
            tracing::warn!(task_id = %task.id(), %topic, error = %err, "event publish failed");
        }
    }

    async fn require_flow(&self, flow_id: FlowId) -> TaskOrchestrationResult<()> {
        if self.state.repository.flow_exists(flow_id).await? {
            Ok(())
        } else {
            Err(TaskOrchestrationError::FlowNotFound(flow_id))
        }
    }

    async fn find_or_error(&self, task_id: TaskId) -> TaskOrchestrationResult<Task> {
        self.state
            .repository
            .find_by_id(task_id)
            .await?
            .ok_or(TaskOrchestrationError::NotFound(task_id))
    }
}

fn cancellation(reason: Option<&str>) -> Value {
    json!({ "error": "cancelled", "reason": reason })
}
