//! Executor port: hands tasks to the external flow runtime.

use crate::task::domain::{Task, TaskId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Result type for executor operations.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Work handed to the executor for one run of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Task being run.
    pub task_id: TaskId,
    /// Opaque workflow marker naming the work.
    pub state: String,
    /// Triggering input.
    pub input_request: Option<Value>,
    /// Ordered attachment references.
    pub attachments: Vec<String>,
}

impl From<&Task> for ExecutionRequest {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id(),
            state: task.state().to_owned(),
            input_request: task.input_request().cloned(),
            attachments: task.attachments().to_vec(),
        }
    }
}

/// Outcome reported back by the executor when a run finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "result", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The run succeeded with the given result.
    Succeeded(Value),
    /// The run failed with the given error payload.
    Failed(Value),
}

/// Contract for the external component that performs task work.
///
/// `invoke` only hands the run over; completion is reported separately
/// through the orchestration service.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Starts a run of the task described by `request`.
    async fn invoke(&self, request: ExecutionRequest) -> ExecutorResult<()>;
}

/// Errors returned by executor adapters.
#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    /// The executor cannot accept work.
    #[error("executor unavailable: {0}")]
    Unavailable(String),

    /// Runtime failure while handing over the run.
    #[error("executor runtime error: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl ExecutorError {
    /// Wraps a runtime error from the executor adapter.
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }
}
