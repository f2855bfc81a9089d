//! `PostgreSQL` adapters for task persistence.
//!
//! The expected schema lives under `migrations/` at the crate root.

mod models;
mod repository;
mod schema;

pub use repository::{PostgresTaskRepository, TaskPgPool};
