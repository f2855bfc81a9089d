//! Task status enumeration and the lifecycle state machine.
//!
//! The transition table is:
//!
//! | From                  | Transition | To           |
//! |-----------------------|------------|--------------|
//! | pending               | dispatch   | processing   |
//! | processing            | complete   | completed    |
//! | processing            | fail       | failed       |
//! | pending, processing   | cancel     | failed       |
//! | completed, failed     | re-arm     | pending      |
//!
//! Re-arming is only permitted for recurring tasks.

use super::{ParseTaskStatusError, TaskDomainError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is waiting to be dispatched.
    Pending,
    /// Task has been handed to the executor and has not reported back.
    Processing,
    /// The executor reported success.
    Completed,
    /// The executor reported failure, timed out, or the run was cancelled.
    Failed,
}

impl TaskStatus {
    /// All lifecycle statuses in lifecycle order.
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::Processing,
        Self::Completed,
        Self::Failed,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Returns whether the status ends a run.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns whether the task still has an active run or is waiting for one.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

/// Validates a caller-supplied status literal.
///
/// Literals must match exactly; only the empty literal defaults to
/// [`TaskStatus::Pending`].
///
/// # Errors
///
/// Returns [`TaskDomainError::InvalidStatus`] for any literal outside the
/// four lifecycle statuses.
pub fn validate_status(value: &str) -> Result<TaskStatus, TaskDomainError> {
    if value.is_empty() {
        return Ok(TaskStatus::Pending);
    }
    TaskStatus::try_from(value).map_err(|err| TaskDomainError::InvalidStatus(err.0))
}

/// A requested lifecycle transition and the payload it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskTransition {
    /// Hand a pending task to the executor.
    Dispatch,
    /// Record executor success with its result.
    Complete(Value),
    /// Record executor failure or timeout with an error payload.
    Fail(Value),
    /// Abort a pending or processing run with a cancellation payload.
    Cancel(Value),
    /// Return a finished recurring task to `pending` for its next run.
    Rearm,
}

impl TaskTransition {
    /// Returns the status reached by this transition.
    #[must_use]
    pub const fn target(&self) -> TaskStatus {
        match self {
            Self::Dispatch => TaskStatus::Processing,
            Self::Complete(_) => TaskStatus::Completed,
            Self::Fail(_) | Self::Cancel(_) => TaskStatus::Failed,
            Self::Rearm => TaskStatus::Pending,
        }
    }

    /// Returns whether the transition is permitted from `from`.
    #[must_use]
    pub const fn is_permitted_from(&self, from: TaskStatus, recurring: bool) -> bool {
        match (self, from) {
            (Self::Dispatch, TaskStatus::Pending)
            | (Self::Complete(_) | Self::Fail(_), TaskStatus::Processing)
            | (Self::Cancel(_), TaskStatus::Pending | TaskStatus::Processing) => true,
            (Self::Rearm, TaskStatus::Completed | TaskStatus::Failed) => recurring,
            _ => false,
        }
    }

    /// Selects the table transition that moves a task from `from` to `to`.
    ///
    /// Used when a status change arrives as a plain target status (for
    /// example through a partial update). Cancellation is never selected
    /// here; it has its own operation. Terminal targets without an explicit
    /// result store an empty object.
    #[must_use]
    pub fn towards(from: TaskStatus, to: TaskStatus, result: Option<Value>) -> Option<Self> {
        let payload = || result.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        match (from, to) {
            (TaskStatus::Pending, TaskStatus::Processing) => Some(Self::Dispatch),
            (TaskStatus::Processing, TaskStatus::Completed) => Some(Self::Complete(payload())),
            (TaskStatus::Processing, TaskStatus::Failed) => Some(Self::Fail(payload())),
            (TaskStatus::Completed | TaskStatus::Failed, TaskStatus::Pending) => Some(Self::Rearm),
            _ => None,
        }
    }
}
