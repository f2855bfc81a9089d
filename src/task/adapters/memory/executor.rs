//! Executor adapter that queues runs on a tokio channel.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::task::ports::{ExecutionRequest, ExecutorError, ExecutorResult, TaskExecutor};

/// Executor that hands each run to whoever drains the paired receiver.
///
/// The receiving side performs the work and reports the outcome back through
/// the orchestration service.
#[derive(Debug, Clone)]
pub struct ChannelExecutor {
    sender: mpsc::UnboundedSender<ExecutionRequest>,
}

impl ChannelExecutor {
    /// Creates an executor and the receiver that yields queued runs.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ExecutionRequest>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl TaskExecutor for ChannelExecutor {
    async fn invoke(&self, request: ExecutionRequest) -> ExecutorResult<()> {
        self.sender.send(request).map_err(|err| {
            ExecutorError::Unavailable(format!("run queue closed for task {}", err.0.task_id))
        })
    }
}
