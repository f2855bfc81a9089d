//! Taskforge: task orchestration engine.
//!
//! This crate tracks units of work created by and assigned to workflow
//! entities ("flows"), advances each task through a validated lifecycle,
//! re-triggers recurring tasks on cron schedules, and emits lifecycle events
//! to an event bus.
//!
//! # Architecture
//!
//! Taskforge follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, channels, etc.)
//!
//! # Modules
//!
//! - [`task`]: Task lifecycle, scheduling, and orchestration
//! - [`config`]: File-based runtime configuration
//! - [`telemetry`]: Tracing subscriber installation

pub mod config;
pub mod task;
pub mod telemetry;
