//! In-process adapters for task lifecycle ports.
//!
//! These back the default binary wiring and the test suites.

mod event_bus;
mod executor;
mod task;

pub use event_bus::{BroadcastEventBus, FlowSubscription};
pub use executor::ChannelExecutor;
pub use task::InMemoryTaskRepository;
