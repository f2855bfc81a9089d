//! Task aggregate root.

use super::{CronSchedule, FlowId, TaskDomainError, TaskId, TaskStatus, TaskTransition};
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    title: String,
    description: String,
    category: String,
    attachments: Vec<String>,
    author_id: FlowId,
    assignee_id: FlowId,
    state: String,
    status: TaskStatus,
    result: Option<Value>,
    input_request: Option<Value>,
    cron_schedule: Option<CronSchedule>,
    dispatched_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for creating a new task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    /// Short task title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Task category.
    pub category: String,
    /// Opaque attachment references, in order.
    pub attachments: Vec<String>,
    /// Authoring flow.
    pub author_id: FlowId,
    /// Assigned flow.
    pub assignee_id: FlowId,
    /// Opaque workflow marker passed to the executor.
    pub state: String,
    /// Triggering input.
    pub input_request: Option<Value>,
    /// Recurrence schedule.
    pub cron_schedule: Option<CronSchedule>,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted title.
    pub title: String,
    /// Persisted description.
    pub description: String,
    /// Persisted category.
    pub category: String,
    /// Persisted attachment references.
    pub attachments: Vec<String>,
    /// Persisted authoring flow.
    pub author_id: FlowId,
    /// Persisted assigned flow.
    pub assignee_id: FlowId,
    /// Persisted workflow marker.
    pub state: String,
    /// Persisted lifecycle status.
    pub status: TaskStatus,
    /// Persisted run result.
    pub result: Option<Value>,
    /// Persisted triggering input.
    pub input_request: Option<Value>,
    /// Persisted recurrence schedule.
    pub cron_schedule: Option<CronSchedule>,
    /// Persisted dispatch timestamp of the current run.
    pub dispatched_at: Option<DateTime<Utc>>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Partial update of a task's non-status fields.
///
/// `None` leaves the corresponding field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRevision {
    /// Replacement title.
    pub title: Option<String>,
    /// Replacement description.
    pub description: Option<String>,
    /// Replacement category.
    pub category: Option<String>,
    /// Replacement attachment list.
    pub attachments: Option<Vec<String>>,
    /// Replacement authoring flow.
    pub author_id: Option<FlowId>,
    /// Replacement assigned flow.
    pub assignee_id: Option<FlowId>,
    /// Replacement workflow marker.
    pub state: Option<String>,
}

impl TaskRevision {
    /// Returns whether the revision changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.attachments.is_none()
            && self.author_id.is_none()
            && self.assignee_id.is_none()
            && self.state.is_none()
    }
}

impl Task {
    /// Creates a new pending task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTitle`] or
    /// [`TaskDomainError::EmptyCategory`] when a required field is blank.
    pub fn new(data: NewTask, clock: &impl Clock) -> Result<Self, TaskDomainError> {
        let title = require_text(&data.title, TaskDomainError::EmptyTitle)?;
        let category = require_text(&data.category, TaskDomainError::EmptyCategory)?;
        let timestamp = stored_instant(clock);

        Ok(Self {
            id: TaskId::new(),
            title,
            description: data.description,
            category,
            attachments: data.attachments,
            author_id: data.author_id,
            assignee_id: data.assignee_id,
            state: data.state,
            status: TaskStatus::Pending,
            result: None,
            input_request: data.input_request,
            cron_schedule: data.cron_schedule,
            dispatched_at: None,
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            title: data.title,
            description: data.description,
            category: data.category,
            attachments: data.attachments,
            author_id: data.author_id,
            assignee_id: data.assignee_id,
            state: data.state,
            status: data.status,
            result: data.result,
            input_request: data.input_request,
            cron_schedule: data.cron_schedule,
            dispatched_at: data.dispatched_at,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the task title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the task description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the task category.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Returns the ordered attachment references.
    #[must_use]
    pub fn attachments(&self) -> &[String] {
        &self.attachments
    }

    /// Returns the authoring flow.
    #[must_use]
    pub const fn author_id(&self) -> FlowId {
        self.author_id
    }

    /// Returns the assigned flow.
    #[must_use]
    pub const fn assignee_id(&self) -> FlowId {
        self.assignee_id
    }

    /// Returns the opaque workflow marker.
    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the run result, present only for finished runs.
    #[must_use]
    pub const fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Returns the triggering input.
    #[must_use]
    pub const fn input_request(&self) -> Option<&Value> {
        self.input_request.as_ref()
    }

    /// Returns the recurrence schedule, if the task is recurring.
    #[must_use]
    pub const fn cron_schedule(&self) -> Option<&CronSchedule> {
        self.cron_schedule.as_ref()
    }

    /// Returns whether the task recurs on a schedule.
    #[must_use]
    pub const fn is_recurring(&self) -> bool {
        self.cron_schedule.is_some()
    }

    /// Returns when the current run was dispatched.
    #[must_use]
    pub const fn dispatched_at(&self) -> Option<DateTime<Utc>> {
        self.dispatched_at
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest mutation timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Applies a lifecycle transition and its side effects.
    ///
    /// The task is left untouched when the transition is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] when the transition is
    /// not in the lifecycle table for the current status, including re-arming
    /// a task without a schedule.
    pub fn apply(
        &mut self,
        transition: TaskTransition,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        if !transition.is_permitted_from(self.status, self.is_recurring()) {
            return Err(TaskDomainError::InvalidTransition {
                task_id: self.id,
                from: self.status,
                to: transition.target(),
            });
        }

        self.status = transition.target();
        self.touch(clock);
        match transition {
            TaskTransition::Dispatch => {
                self.dispatched_at = Some(self.updated_at);
            }
            TaskTransition::Complete(result)
            | TaskTransition::Fail(result)
            | TaskTransition::Cancel(result) => {
                self.result = Some(result);
            }
            TaskTransition::Rearm => {
                self.result = None;
                self.dispatched_at = None;
            }
        }
        Ok(())
    }

    /// Applies a partial update of non-status fields.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTitle`] or
    /// [`TaskDomainError::EmptyCategory`] when a replacement is blank. The
    /// task is left untouched on error.
    pub fn revise(
        &mut self,
        revision: TaskRevision,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        let title = revision
            .title
            .map(|title| require_text(&title, TaskDomainError::EmptyTitle))
            .transpose()?;
        let category = revision
            .category
            .map(|category| require_text(&category, TaskDomainError::EmptyCategory))
            .transpose()?;

        if let Some(value) = title {
            self.title = value;
        }
        if let Some(value) = category {
            self.category = value;
        }
        if let Some(value) = revision.description {
            self.description = value;
        }
        if let Some(value) = revision.attachments {
            self.attachments = value;
        }
        if let Some(value) = revision.author_id {
            self.author_id = value;
        }
        if let Some(value) = revision.assignee_id {
            self.assignee_id = value;
        }
        if let Some(value) = revision.state {
            self.state = value;
        }
        self.touch(clock);
        Ok(())
    }

    /// Drops the recurrence schedule; returns whether one was set.
    pub fn stop_recurring(&mut self, clock: &impl Clock) -> bool {
        if self.cron_schedule.take().is_none() {
            return false;
        }
        self.touch(clock);
        true
    }

    /// Advances `updated_at`, keeping it strictly increasing even when the
    /// clock has not moved.
    fn touch(&mut self, clock: &impl Clock) {
        let now = stored_instant(clock);
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at
                .checked_add_signed(TimeDelta::microseconds(1))
                .unwrap_or(now)
        };
    }
}

/// Returns the trimmed value, or the given error when it is blank.
/// Reads the clock at the microsecond precision the task stores keep.
fn stored_instant(clock: &impl Clock) -> DateTime<Utc> {
    clock.utc().trunc_subsecs(6)
}

fn require_text(value: &str, empty_error: TaskDomainError) -> Result<String, TaskDomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(empty_error);
    }
    Ok(trimmed.to_owned())
}
