//! End-to-end task lifecycle through the orchestration service.

use super::helpers::{Rig, rig};
use rstest::rstest;
use serde_json::json;
use std::time::Duration;
use taskforge::task::{
    domain::TaskStatus,
    ports::{ExecutionOutcome, PageRequest},
    services::{
        CancelTaskRequest, OrchestrationSettings, TaskOrchestrationError, UpdateTaskRequest,
    },
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn executor_round_trip_completes_task(mut rig: Rig) -> Result<(), eyre::Report> {
    let task = rig
        .service
        .create(
            rig.request("Resize images")
                .with_attachments(vec!["s3://media/batch-7".to_owned()])
                .with_input_request(json!({"width": 640})),
        )
        .await?;

    rig.service.dispatch(task.id()).await?;
    let run = rig.next_run().await?;
    let reported = rig
        .service
        .report(run.task_id, ExecutionOutcome::Succeeded(json!({"resized": 12})))
        .await?;

    eyre::ensure!(run.attachments == ["s3://media/batch-7".to_owned()], "attachments");
    eyre::ensure!(run.input_request == Some(json!({"width": 640})), "input");
    let finished = reported.ok_or_else(|| eyre::eyre!("report was absorbed"))?;
    eyre::ensure!(finished.status() == TaskStatus::Completed, "status");
    eyre::ensure!(finished.result() == Some(&json!({"resized": 12})), "result");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancelled_run_absorbs_late_executor_report(mut rig: Rig) -> Result<(), eyre::Report> {
    let task = rig.service.create(rig.request("Crawl")).await?;
    rig.service.dispatch(task.id()).await?;
    let run = rig.next_run().await?;

    rig.service
        .cancel(task.id(), CancelTaskRequest::new().with_reason("operator"))
        .await?;
    let late = rig
        .service
        .report(run.task_id, ExecutionOutcome::Succeeded(json!({"pages": 3})))
        .await?;

    eyre::ensure!(late.is_none(), "late report must be absorbed");
    let stored = rig.service.get(task.id()).await?;
    eyre::ensure!(stored.status() == TaskStatus::Failed, "status");
    eyre::ensure!(
        stored.result() == Some(&json!({"error": "cancelled", "reason": "operator"})),
        "result {:?}",
        stored.result()
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn update_changes_fields_without_touching_identity(rig: Rig) -> Result<(), eyre::Report> {
    let task = rig.service.create(rig.request("Crawl")).await?;

    let updated = rig
        .service
        .update(
            task.id(),
            UpdateTaskRequest::new()
                .with_description("Crawl the docs site")
                .with_state("queued"),
        )
        .await?;

    eyre::ensure!(updated.id() == task.id(), "identifier changed");
    eyre::ensure!(updated.created_at() == task.created_at(), "creation changed");
    eyre::ensure!(updated.description() == "Crawl the docs site", "description");
    eyre::ensure!(updated.state() == "queued", "state");
    eyre::ensure!(updated.status() == TaskStatus::Pending, "status");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn update_with_blank_title_is_rejected(rig: Rig) -> Result<(), eyre::Report> {
    let task = rig.service.create(rig.request("Crawl")).await?;

    let result = rig
        .service
        .update(task.id(), UpdateTaskRequest::new().with_title("   "))
        .await;

    eyre::ensure!(
        matches!(result, Err(TaskOrchestrationError::Validation(_))),
        "expected validation error, got {result:?}"
    );
    eyre::ensure!(rig.service.get(task.id()).await? == task, "task changed");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stalled_run_is_failed_by_timeout() -> Result<(), eyre::Report> {
    let mut rig = Rig::with_settings(
        OrchestrationSettings::default().with_execution_timeout(Duration::from_millis(40)),
    );
    let task = rig.service.create(rig.request("Crawl")).await?;

    rig.service.dispatch(task.id()).await?;
    rig.next_run().await?;
    let failed = rig.await_status(task.id(), TaskStatus::Failed).await?;

    eyre::ensure!(
        failed.result() == Some(&json!({"error": "timed out"})),
        "result {:?}",
        failed.result()
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleted_task_disappears_from_listings(rig: Rig) -> Result<(), eyre::Report> {
    let kept = rig.service.create(rig.request("Keep")).await?;
    let dropped = rig.service.create(rig.request("Drop")).await?;

    let removed = rig.service.delete(dropped.id()).await?;
    let remaining = rig.service.list(PageRequest::default()).await?;

    eyre::ensure!(removed.id() == dropped.id(), "wrong task removed");
    eyre::ensure!(remaining == vec![kept], "unexpected listing {remaining:?}");
    let lookup = rig.service.get(dropped.id()).await;
    eyre::ensure!(
        lookup.is_err_and(|err| err.is_not_found()),
        "deleted task still resolvable"
    );
    Ok(())
}
