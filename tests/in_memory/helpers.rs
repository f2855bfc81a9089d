//! Shared test helpers for in-memory integration tests.

use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::Clock;
use rstest::fixture;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use taskforge::task::{
    adapters::memory::{BroadcastEventBus, ChannelExecutor, InMemoryTaskRepository},
    domain::{FlowId, Task, TaskId, TaskStatus},
    ports::ExecutionRequest,
    services::{CreateTaskRequest, OrchestrationSettings, TaskOrchestrationService},
};
use tokio::sync::mpsc::UnboundedReceiver;

/// Clock advanced explicitly by the test.
#[derive(Debug)]
pub struct SteppedClock {
    now: Mutex<DateTime<Utc>>,
}

impl SteppedClock {
    /// Creates a clock frozen at `now`.
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }
}

impl Clock for SteppedClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Service wired to in-memory adapters and a stepped clock.
pub type TestService = TaskOrchestrationService<
    InMemoryTaskRepository,
    BroadcastEventBus,
    ChannelExecutor,
    SteppedClock,
>;

/// A service plus handles on every adapter it was built from.
pub struct Rig {
    pub service: TestService,
    pub repository: Arc<InMemoryTaskRepository>,
    pub bus: Arc<BroadcastEventBus>,
    pub clock: Arc<SteppedClock>,
    pub runs: UnboundedReceiver<ExecutionRequest>,
    pub flow: FlowId,
}

impl Rig {
    /// Builds a rig with one registered flow and the given settings.
    #[must_use]
    pub fn with_settings(settings: OrchestrationSettings) -> Self {
        let flow = FlowId::new();
        let repository = Arc::new(InMemoryTaskRepository::with_flows([flow]));
        let bus = Arc::new(BroadcastEventBus::new(64));
        let (executor, runs) = ChannelExecutor::new();
        let clock = Arc::new(SteppedClock::new(parse_instant("2026-03-02T12:00:30Z")));
        let service = TaskOrchestrationService::new(
            Arc::clone(&repository),
            Arc::clone(&bus),
            Arc::new(executor),
            Arc::clone(&clock),
            settings,
        );
        Self {
            service,
            repository,
            bus,
            clock,
            runs,
            flow,
        }
    }

    /// Builds a request authored by and assigned to the rig's flow.
    #[must_use]
    pub fn request(&self, title: &str) -> CreateTaskRequest {
        CreateTaskRequest::new(title, "ops", self.flow, self.flow).with_state("run")
    }

    /// Waits for the executor to receive a run.
    ///
    /// # Errors
    ///
    /// Returns an error if no run arrives within five seconds.
    pub async fn next_run(&mut self) -> Result<ExecutionRequest, eyre::Report> {
        tokio::time::timeout(Duration::from_secs(5), self.runs.recv())
            .await
            .map_err(|_| eyre::eyre!("executor was not invoked in time"))?
            .ok_or_else(|| eyre::eyre!("executor channel closed"))
    }

    /// Polls until the task reaches `status`.
    ///
    /// # Errors
    ///
    /// Returns an error if the task is missing or never reaches `status`.
    pub async fn await_status(
        &self,
        task_id: TaskId,
        status: TaskStatus,
    ) -> Result<Task, eyre::Report> {
        for _ in 0..500 {
            let task = self.service.get(task_id).await?;
            if task.status() == status {
                return Ok(task);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Err(eyre::eyre!("task {task_id} never reached {status}"))
    }
}

/// Provides a rig with default settings.
#[fixture]
pub fn rig() -> Rig {
    Rig::with_settings(OrchestrationSettings::default())
}

/// Parses an RFC 3339 timestamp.
///
/// # Panics
///
/// Panics if `text` is not a valid RFC 3339 timestamp.
#[must_use]
pub fn parse_instant(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text)
        .expect("valid RFC 3339 timestamp")
        .with_timezone(&Utc)
}
