//! Application services for task orchestration and scheduling.

mod locks;
mod orchestration;
mod requests;
mod scheduler;
mod ticker;

pub use orchestration::{
    OrchestrationSettings, TaskOrchestrationError, TaskOrchestrationResult,
    TaskOrchestrationService,
};
pub use requests::{CancelTaskRequest, CreateTaskRequest, UpdateTaskRequest};
pub use scheduler::Scheduler;
pub use ticker::{SchedulerTicker, TickerHandle};
