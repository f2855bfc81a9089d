//! Step definitions for task orchestration scenarios.

mod given;
mod then;
pub mod world;
