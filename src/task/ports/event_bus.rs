//! Event bus port for lifecycle notifications.

use crate::task::domain::TaskEvent;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for event bus operations.
pub type EventBusResult<T> = Result<T, EventBusError>;

/// Publish side of the lifecycle event channel.
///
/// Delivery is at-least-once and fire-and-forget from the caller's
/// perspective: a publish failure never rolls back the state change that
/// produced the event.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publishes an event on its topic.
    async fn publish(&self, event: TaskEvent) -> EventBusResult<()>;
}

/// Errors returned by event bus adapters.
#[derive(Debug, Clone, Error)]
pub enum EventBusError {
    /// The bus no longer accepts events.
    #[error("event bus is closed")]
    Closed,

    /// Transport-level failure.
    #[error("event bus transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl EventBusError {
    /// Wraps a transport error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}
