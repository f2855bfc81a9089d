//! Domain model for task lifecycle management.
//!
//! The task domain models task creation, the status state machine, cron
//! schedules, and lifecycle notifications while keeping all infrastructure
//! concerns outside of the domain boundary.

mod error;
mod event;
mod ids;
mod schedule;
mod status;
mod task;

pub use error::{ParseTaskStatusError, TaskDomainError};
pub use event::{TaskEvent, TaskNotification, TaskTopic};
pub use ids::{FlowId, TaskId};
pub use schedule::CronSchedule;
pub use status::{TaskStatus, TaskTransition, validate_status};
pub use task::{NewTask, PersistedTaskData, Task, TaskRevision};
