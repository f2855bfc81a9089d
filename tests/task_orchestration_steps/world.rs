//! Shared world state for task orchestration BDD scenarios.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local, Utc};
use mockable::Clock;
use rstest::fixture;
use taskforge::task::{
    adapters::memory::{BroadcastEventBus, ChannelExecutor, InMemoryTaskRepository},
    domain::{FlowId, Task},
    ports::ExecutionRequest,
    services::{OrchestrationSettings, TaskOrchestrationError, TaskOrchestrationService},
};
use tokio::sync::mpsc::UnboundedReceiver;

/// Clock whose reading is set by scenario steps.
#[derive(Debug, Default)]
pub struct ScenarioClock {
    now: Mutex<DateTime<Utc>>,
}

impl ScenarioClock {
    /// Sets the current reading.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }
}

impl Clock for ScenarioClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Service type used by the BDD world.
pub type TestOrchestrationService = TaskOrchestrationService<
    InMemoryTaskRepository,
    BroadcastEventBus,
    ChannelExecutor,
    ScenarioClock,
>;

/// Scenario world for task orchestration behaviour tests.
pub struct OrchestrationWorld {
    pub service: TestOrchestrationService,
    pub repository: Arc<InMemoryTaskRepository>,
    pub clock: Arc<ScenarioClock>,
    pub runs: UnboundedReceiver<ExecutionRequest>,
    pub flow: Option<FlowId>,
    pub task: Option<Task>,
    pub last_error: Option<TaskOrchestrationError>,
}

impl OrchestrationWorld {
    /// Creates a world with no flows and no tasks.
    #[must_use]
    pub fn new() -> Self {
        let repository = Arc::new(InMemoryTaskRepository::new());
        let clock = Arc::new(ScenarioClock::default());
        let (executor, runs) = ChannelExecutor::new();
        let service = TaskOrchestrationService::new(
            Arc::clone(&repository),
            Arc::new(BroadcastEventBus::default()),
            Arc::new(executor),
            Arc::clone(&clock),
            OrchestrationSettings::default(),
        );

        Self {
            service,
            repository,
            clock,
            runs,
            flow: None,
            task: None,
            last_error: None,
        }
    }

    /// Returns the registered flow.
    ///
    /// # Errors
    ///
    /// Returns an error if no flow was registered by an earlier step.
    pub fn flow(&self) -> Result<FlowId, eyre::Report> {
        self.flow
            .ok_or_else(|| eyre::eyre!("missing registered flow in scenario world"))
    }

    /// Returns the task under test.
    ///
    /// # Errors
    ///
    /// Returns an error if no task was created by an earlier step.
    pub fn task(&self) -> Result<&Task, eyre::Report> {
        self.task
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing task in scenario world"))
    }
}

impl Default for OrchestrationWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> OrchestrationWorld {
    OrchestrationWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

/// Parses an RFC 3339 timestamp from step text.
///
/// # Errors
///
/// Returns an error if `text` is not a valid RFC 3339 timestamp.
pub fn parse_instant(text: &str) -> Result<DateTime<Utc>, eyre::Report> {
    Ok(DateTime::parse_from_rfc3339(text)?.with_timezone(&Utc))
}
