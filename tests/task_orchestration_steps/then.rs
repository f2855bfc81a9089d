//! Then steps for task orchestration BDD scenarios.

use super::world::{OrchestrationWorld, run_async};
use rstest_bdd_macros::then;
use serde_json::json;
use std::time::Duration;
use taskforge::task::{
    domain::{Task, TaskStatus},
    ports::{PageRequest, TaskRepository},
    services::TaskOrchestrationError,
};

fn current_task(world: &OrchestrationWorld) -> Result<Task, eyre::Report> {
    let task_id = world.task()?.id();
    Ok(run_async(world.service.get(task_id))?)
}

#[then(r#"the task status is "{status}""#)]
fn task_status_is(world: &OrchestrationWorld, status: String) -> Result<(), eyre::Report> {
    let expected = TaskStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid expected status in scenario: {err}"))?;
    let task = current_task(world)?;
    eyre::ensure!(
        task.status() == expected,
        "expected status {expected}, found {}",
        task.status()
    );
    Ok(())
}

#[then("the executor received the task")]
fn executor_received_task(world: &mut OrchestrationWorld) -> Result<(), eyre::Report> {
    let task_id = world.task()?.id();
    let run = run_async(tokio::time::timeout(
        Duration::from_secs(5),
        world.runs.recv(),
    ))
    .map_err(|_| eyre::eyre!("executor was not invoked in time"))?
    .ok_or_else(|| eyre::eyre!("executor channel closed"))?;
    eyre::ensure!(run.task_id == task_id, "executor received another task");
    Ok(())
}

#[then("the task result records {count:u32} items")]
fn task_result_records(world: &OrchestrationWorld, count: u32) -> Result<(), eyre::Report> {
    let task = current_task(world)?;
    eyre::ensure!(
        task.result() == Some(&json!({ "items": count })),
        "unexpected result {:?}",
        task.result()
    );
    Ok(())
}

#[then("the task has no result")]
fn task_has_no_result(world: &OrchestrationWorld) -> Result<(), eyre::Report> {
    let task = current_task(world)?;
    eyre::ensure!(task.result().is_none(), "unexpected result {:?}", task.result());
    Ok(())
}

#[then("the task is no longer scheduled")]
fn task_no_longer_scheduled(world: &OrchestrationWorld) -> Result<(), eyre::Report> {
    let task = current_task(world)?;
    eyre::ensure!(!task.is_recurring(), "task still carries a schedule");
    eyre::ensure!(
        !world.service.scheduler().is_registered(task.id()),
        "task still registered with the scheduler"
    );
    Ok(())
}

#[then("the operation fails with an invalid transition error")]
fn fails_with_invalid_transition(world: &OrchestrationWorld) -> Result<(), eyre::Report> {
    let error = world
        .last_error
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing operation error"))?;
    eyre::ensure!(
        matches!(error, TaskOrchestrationError::InvalidTransition { .. }),
        "expected InvalidTransition error, got {error:?}"
    );
    Ok(())
}

#[then("the operation fails with a validation error")]
fn fails_with_validation_error(world: &OrchestrationWorld) -> Result<(), eyre::Report> {
    let error = world
        .last_error
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing operation error"))?;
    eyre::ensure!(
        matches!(error, TaskOrchestrationError::Validation(_)),
        "expected Validation error, got {error:?}"
    );
    Ok(())
}

#[then("no task is stored")]
fn no_task_is_stored(world: &OrchestrationWorld) -> Result<(), eyre::Report> {
    let stored = run_async(world.repository.list(PageRequest::default()))?;
    eyre::ensure!(stored.is_empty(), "unexpected tasks {stored:?}");
    Ok(())
}
