//! Unit tests for the task domain, scheduler, and orchestration service.
