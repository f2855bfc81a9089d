//! Request payloads accepted by the orchestration service.

use crate::task::domain::{FlowId, TaskRevision};
use serde_json::Value;

/// Request payload for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) category: String,
    pub(crate) attachments: Vec<String>,
    pub(crate) author_id: FlowId,
    pub(crate) assignee_id: FlowId,
    pub(crate) state: String,
    pub(crate) status: Option<String>,
    pub(crate) input_request: Option<Value>,
    pub(crate) cron_expression: Option<String>,
}

impl CreateTaskRequest {
    /// Creates a request with the required task fields.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        category: impl Into<String>,
        author_id: FlowId,
        assignee_id: FlowId,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            category: category.into(),
            attachments: Vec::new(),
            author_id,
            assignee_id,
            state: String::new(),
            status: None,
            input_request: None,
            cron_expression: None,
        }
    }

    /// Sets the task description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the attachment references.
    #[must_use]
    pub fn with_attachments(mut self, attachments: impl IntoIterator<Item = String>) -> Self {
        self.attachments = attachments.into_iter().collect();
        self
    }

    /// Sets the opaque workflow marker.
    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    /// Sets the initial status literal; blank means `pending`.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Sets the triggering input payload.
    #[must_use]
    pub fn with_input_request(mut self, input_request: Value) -> Self {
        self.input_request = Some(input_request);
        self
    }

    /// Makes the task recurring on a cron schedule.
    #[must_use]
    pub fn with_cron_expression(mut self, cron_expression: impl Into<String>) -> Self {
        self.cron_expression = Some(cron_expression.into());
        self
    }
}

/// Request payload for a partial task update.
///
/// Unset fields are left untouched. A status, when present, is applied
/// through the lifecycle state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateTaskRequest {
    pub(crate) revision: TaskRevision,
    pub(crate) status: Option<String>,
    pub(crate) result: Option<Value>,
}

impl UpdateTaskRequest {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.revision.title = Some(title.into());
        self
    }

    /// Replaces the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.revision.description = Some(description.into());
        self
    }

    /// Replaces the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.revision.category = Some(category.into());
        self
    }

    /// Replaces the attachment references.
    #[must_use]
    pub fn with_attachments(mut self, attachments: impl IntoIterator<Item = String>) -> Self {
        self.revision.attachments = Some(attachments.into_iter().collect());
        self
    }

    /// Reassigns the authoring flow.
    #[must_use]
    pub const fn with_author(mut self, author_id: FlowId) -> Self {
        self.revision.author_id = Some(author_id);
        self
    }

    /// Reassigns the task to another flow.
    #[must_use]
    pub const fn with_assignee(mut self, assignee_id: FlowId) -> Self {
        self.revision.assignee_id = Some(assignee_id);
        self
    }

    /// Replaces the opaque workflow marker.
    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.revision.state = Some(state.into());
        self
    }

    /// Requests a status change.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Supplies the result stored with a completed or failed status.
    #[must_use]
    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }
}

/// Request payload for cancelling a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CancelTaskRequest {
    pub(crate) reason: Option<String>,
    pub(crate) keep_schedule: bool,
}

impl CancelTaskRequest {
    /// Creates a cancellation that also stops recurrence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records why the task was cancelled.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Keeps a recurring task registered so it fires again on schedule.
    #[must_use]
    pub const fn keep_schedule(mut self) -> Self {
        self.keep_schedule = true;
        self
    }
}
