//! Task lifecycle management for Taskforge.
//!
//! Tasks are created by flows, assigned to flows, and advanced through the
//! `pending → processing → completed | failed` lifecycle by the orchestration
//! service, which is the sole mutator of task status. Recurring tasks carry a
//! cron expression and are re-armed by the scheduler. The module follows
//! hexagonal architecture:
//!
//! - Domain types and the status state machine in [`domain`]
//! - Port contracts (repository, event bus, executor) in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Scheduler and orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
