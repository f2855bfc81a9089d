//! In-process event bus based on tokio broadcast channels.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::task::{
    domain::{FlowId, TaskEvent},
    ports::{EventBus, EventBusResult},
};

/// Fan-out event bus delivering every event to all live subscribers.
///
/// Subscribers that fall more than `capacity` events behind observe a lag
/// error on their receiver and skip the missed events.
#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<TaskEvent>,
    capacity: usize,
}

impl BroadcastEventBus {
    /// Default channel capacity for local subscribers.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Creates a bus with the given channel capacity (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let bounded = capacity.max(1);
        let (sender, _) = broadcast::channel(bounded);
        Self {
            sender,
            capacity: bounded,
        }
    }

    /// Returns the configured channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Subscribes to all events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }

    /// Subscribes a flow to events about the tasks it authored or was
    /// assigned, published after this call.
    ///
    /// Dropping the returned subscription unsubscribes the flow.
    #[must_use]
    pub fn subscribe_flow(&self, flow_id: FlowId) -> FlowSubscription {
        tracing::debug!(%flow_id, "flow subscribed to task events");
        FlowSubscription {
            flow_id,
            receiver: self.sender.subscribe(),
        }
    }
}

/// Receiver for the events that concern a single flow.
#[derive(Debug)]
pub struct FlowSubscription {
    flow_id: FlowId,
    receiver: broadcast::Receiver<TaskEvent>,
}

impl FlowSubscription {
    /// Returns the subscribed flow.
    #[must_use]
    pub const fn flow_id(&self) -> FlowId {
        self.flow_id
    }

    /// Waits for the next event whose task names this flow as author or
    /// assignee.
    ///
    /// # Errors
    ///
    /// Returns [`broadcast::error::RecvError::Lagged`] when the subscription
    /// fell behind the channel capacity (the next call resumes with the
    /// oldest retained event) and [`broadcast::error::RecvError::Closed`]
    /// once the bus is gone.
    pub async fn recv(&mut self) -> Result<TaskEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.concerns(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns the next already-published event for this flow, if any.
    ///
    /// # Errors
    ///
    /// Returns [`broadcast::error::TryRecvError::Empty`] when no matching
    /// event is waiting, plus the lag and close errors of the channel.
    pub fn try_recv(&mut self) -> Result<TaskEvent, broadcast::error::TryRecvError> {
        loop {
            let event = self.receiver.try_recv()?;
            if self.concerns(&event) {
                return Ok(event);
            }
        }
    }

    fn concerns(&self, event: &TaskEvent) -> bool {
        let notification = event.notification();
        notification.author_id == self.flow_id || notification.assignee_id == self.flow_id
    }
}

impl Drop for FlowSubscription {
    fn drop(&mut self) {
        tracing::debug!(flow_id = %self.flow_id, "flow unsubscribed from task events");
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl EventBus for BroadcastEventBus {
    async fn publish(&self, event: TaskEvent) -> EventBusResult<()> {
        // No subscribers is not an error.
        if let Err(broadcast::error::SendError(dropped)) = self.sender.send(event) {
            tracing::trace!(topic = %dropped.topic(), "no subscribers for event");
        }
        Ok(())
    }
}
