//! Lifecycle events observed through the broadcast bus.

use super::helpers::{Rig, rig};
use rstest::rstest;
use serde_json::json;
use taskforge::task::domain::{TaskStatus, TaskTopic};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn every_subscriber_sees_the_full_lifecycle(mut rig: Rig) -> Result<(), eyre::Report> {
    let mut audit = rig.bus.subscribe();
    let mut metrics = rig.bus.subscribe();

    let task = rig
        .service
        .create(rig.request("Backup").with_input_request(json!({"volume": "db"})))
        .await?;
    rig.service.dispatch(task.id()).await?;
    rig.next_run().await?;
    rig.service.complete(task.id(), json!({"bytes": 2048})).await?;

    for receiver in [&mut audit, &mut metrics] {
        let mut topics = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            eyre::ensure!(event.task_id() == task.id(), "event for unexpected task");
            topics.push(event.topic());
        }
        eyre::ensure!(
            topics == [TaskTopic::Created, TaskTopic::Started, TaskTopic::Completed],
            "unexpected topics {topics:?}"
        );
    }
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn payload_carries_status_input_and_result(mut rig: Rig) -> Result<(), eyre::Report> {
    let task = rig
        .service
        .create(rig.request("Backup").with_input_request(json!({"volume": "db"})))
        .await?;
    rig.service.dispatch(task.id()).await?;
    let mut receiver = rig.bus.subscribe();

    rig.service
        .fail(task.id(), json!({"error": "disk full"}))
        .await?;
    let event = receiver.recv().await?;
    let payload = event.payload();

    eyre::ensure!(event.topic() == TaskTopic::Failed, "expected failure event");
    eyre::ensure!(event.notification().status == TaskStatus::Failed, "status");
    eyre::ensure!(payload["status"] == json!("failed"), "payload status {payload}");
    eyre::ensure!(
        payload["input_request"] == json!({"volume": "db"}),
        "payload input {payload}"
    );
    eyre::ensure!(
        payload["result"] == json!({"error": "disk full"}),
        "payload result {payload}"
    );
    eyre::ensure!(payload["state"] == json!("run"), "payload state {payload}");
    Ok(())
}
