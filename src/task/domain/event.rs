//! Lifecycle notifications published to the event bus.

use super::{FlowId, Task, TaskId, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Event bus topic for a task lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskTopic {
    /// A task was created.
    #[serde(rename = "task.created")]
    Created,
    /// A task was dispatched to the executor.
    #[serde(rename = "task.started")]
    Started,
    /// The executor reported success.
    #[serde(rename = "task.completed")]
    Completed,
    /// The executor reported failure or the run timed out.
    #[serde(rename = "task.failed")]
    Failed,
    /// A pending or processing task was cancelled.
    #[serde(rename = "task.cancelled")]
    Cancelled,
    /// Descriptive fields or status were changed through an update.
    #[serde(rename = "task.updated")]
    Updated,
    /// A task was deleted.
    #[serde(rename = "task.deleted")]
    Deleted,
}

impl TaskTopic {
    /// Returns the topic name used on the bus.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "task.created",
            Self::Started => "task.started",
            Self::Completed => "task.completed",
            Self::Failed => "task.failed",
            Self::Cancelled => "task.cancelled",
            Self::Updated => "task.updated",
            Self::Deleted => "task.deleted",
        }
    }

    /// Returns the topic announcing that a task reached `status`, if any.
    #[must_use]
    pub const fn for_status(status: TaskStatus) -> Option<Self> {
        match status {
            TaskStatus::Pending => None,
            TaskStatus::Processing => Some(Self::Started),
            TaskStatus::Completed => Some(Self::Completed),
            TaskStatus::Failed => Some(Self::Failed),
        }
    }
}

impl fmt::Display for TaskTopic {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Snapshot of a task carried in every notification payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNotification {
    /// Task identifier.
    pub task_id: TaskId,
    /// Authoring flow.
    pub author_id: FlowId,
    /// Assigned flow.
    pub assignee_id: FlowId,
    /// Task category.
    pub category: String,
    /// Opaque workflow marker.
    pub state: String,
    /// Lifecycle status at publication time.
    pub status: TaskStatus,
    /// Triggering input, if any.
    pub input_request: Option<Value>,
    /// Run result, if any.
    pub result: Option<Value>,
}

impl From<&Task> for TaskNotification {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id(),
            author_id: task.author_id(),
            assignee_id: task.assignee_id(),
            category: task.category().to_owned(),
            state: task.state().to_owned(),
            status: task.status(),
            input_request: task.input_request().cloned(),
            result: task.result().cloned(),
        }
    }
}

/// A lifecycle event ready for publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEvent {
    topic: TaskTopic,
    notification: TaskNotification,
    occurred_at: DateTime<Utc>,
}

impl TaskEvent {
    /// Creates an event for `task` on `topic`.
    #[must_use]
    pub fn new(topic: TaskTopic, task: &Task, occurred_at: DateTime<Utc>) -> Self {
        Self {
            topic,
            notification: TaskNotification::from(task),
            occurred_at,
        }
    }

    /// Returns the event topic.
    #[must_use]
    pub const fn topic(&self) -> TaskTopic {
        self.topic
    }

    /// Returns the task identifier the event refers to.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.notification.task_id
    }

    /// Returns the task snapshot.
    #[must_use]
    pub const fn notification(&self) -> &TaskNotification {
        &self.notification
    }

    /// Returns the publication timestamp.
    #[must_use]
    pub const fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    /// Returns the structured payload as JSON.
    ///
    /// Falls back to `null` if serialization fails.
    #[must_use]
    pub fn payload(&self) -> Value {
        serde_json::to_value(&self.notification).unwrap_or(Value::Null)
    }
}
