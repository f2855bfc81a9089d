//! Error types for task domain validation, parsing, and transitions.

use super::{TaskId, TaskStatus};
use thiserror::Error;

/// Errors returned while constructing or mutating domain task values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The task title is empty after trimming.
    #[error("task title must not be empty")]
    EmptyTitle,

    /// The task category is empty after trimming.
    #[error("task category must not be empty")]
    EmptyCategory,

    /// The status literal is not one of the lifecycle statuses.
    #[error("invalid status '{0}', must be one of: pending, processing, completed, failed")]
    InvalidStatus(String),

    /// The cron expression is malformed or can never fire.
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidSchedule {
        /// Expression as supplied by the caller.
        expression: String,
        /// Human-readable parse failure.
        reason: String,
    },

    /// New tasks always start in `pending`.
    #[error("tasks must be created as pending, not {0}")]
    InitialStatusNotPending(TaskStatus),

    /// A result payload was supplied without a terminal target status.
    #[error("a result may only be set together with a completed or failed status")]
    ResultRequiresTerminalStatus,

    /// The requested status change is not permitted from the current status.
    #[error("invalid status transition for task {task_id}: {from} -> {to}")]
    InvalidTransition {
        /// Task identifier.
        task_id: TaskId,
        /// Current status.
        from: TaskStatus,
        /// Requested target status.
        to: TaskStatus,
    },
}

/// Error returned while parsing task statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);
