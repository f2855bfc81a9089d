//! Repository port for task persistence, lookup, and flow resolution.

use crate::task::domain::{FlowId, Task, TaskId, TaskStatus};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for task repository operations.
pub type TaskRepositoryResult<T> = Result<T, TaskRepositoryError>;

/// Offset pagination for task listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Number of tasks to skip.
    pub offset: usize,
    /// Maximum number of tasks to return.
    pub limit: usize,
}

impl PageRequest {
    /// Default page size.
    pub const DEFAULT_LIMIT: usize = 100;

    /// Creates a page request.
    #[must_use]
    pub const fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, Self::DEFAULT_LIMIT)
    }
}

/// Task persistence contract.
///
/// Listings are ordered by creation time, oldest first.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Stores a new task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::DuplicateTask`] when the task ID already
    /// exists.
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()>;

    /// Replaces the persisted state of an existing task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the task does not exist.
    async fn update(&self, task: &Task) -> TaskRepositoryResult<()>;

    /// Removes a task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the task does not exist.
    async fn delete(&self, id: TaskId) -> TaskRepositoryResult<()>;

    /// Finds a task by identifier.
    ///
    /// Returns `None` when the task does not exist.
    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>>;

    /// Returns one page of all tasks.
    async fn list(&self, page: PageRequest) -> TaskRepositoryResult<Vec<Task>>;

    /// Returns all tasks currently in `status`.
    async fn list_by_status(&self, status: TaskStatus) -> TaskRepositoryResult<Vec<Task>>;

    /// Returns all tasks authored by the given flow.
    async fn list_by_author(&self, author_id: FlowId) -> TaskRepositoryResult<Vec<Task>>;

    /// Returns all tasks that carry a cron schedule.
    async fn list_recurring(&self) -> TaskRepositoryResult<Vec<Task>>;

    /// Reports whether a flow with the given identifier exists.
    async fn flow_exists(&self, flow_id: FlowId) -> TaskRepositoryResult<bool>;
}

/// Errors returned by task repository implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskRepositoryError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
