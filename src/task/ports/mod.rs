//! Port contracts for task lifecycle management.
//!
//! Ports define infrastructure-agnostic interfaces used by task services:
//! persistence, lifecycle event publication, and work execution.

pub mod event_bus;
pub mod executor;
pub mod repository;

pub use event_bus::{EventBus, EventBusError, EventBusResult};
pub use executor::{ExecutionOutcome, ExecutionRequest, ExecutorError, ExecutorResult, TaskExecutor};
pub use repository::{PageRequest, TaskRepository, TaskRepositoryError, TaskRepositoryResult};
