//! Recurring tasks driven by the scheduler ticker.

use super::helpers::{Rig, rig};
use chrono::TimeDelta;
use rstest::rstest;
use serde_json::json;
use std::time::Duration;
use taskforge::task::{domain::TaskStatus, services::SchedulerTicker};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn ticker_fires_recurring_task_once_per_window(mut rig: Rig) -> Result<(), eyre::Report> {
    let task = rig
        .service
        .create(rig.request("Heartbeat").with_cron_expression("*/10 * * * *"))
        .await?;
    let ticker = SchedulerTicker::new(rig.service.clone(), Duration::from_millis(5)).spawn();

    rig.clock.advance(TimeDelta::minutes(10));
    let run = rig.next_run().await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let extra = rig.runs.try_recv();
    ticker.stop().await;

    eyre::ensure!(run.task_id == task.id(), "unexpected task fired");
    eyre::ensure!(extra.is_err(), "window fired more than once");
    let stored = rig.service.get(task.id()).await?;
    eyre::ensure!(stored.status() == TaskStatus::Processing, "status");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn ticker_rearms_finished_task_on_next_window(mut rig: Rig) -> Result<(), eyre::Report> {
    let task = rig
        .service
        .create(rig.request("Heartbeat").with_cron_expression("*/10 * * * *"))
        .await?;
    let ticker = SchedulerTicker::new(rig.service.clone(), Duration::from_millis(5)).spawn();

    rig.clock.advance(TimeDelta::minutes(10));
    rig.next_run().await?;
    rig.service.complete(task.id(), json!({"beat": 1})).await?;
    rig.clock.advance(TimeDelta::minutes(10));
    rig.next_run().await?;
    ticker.stop().await;

    let stored = rig.service.get(task.id()).await?;
    eyre::ensure!(stored.status() == TaskStatus::Processing, "status");
    eyre::ensure!(stored.result().is_none(), "result survived re-arm");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stopped_ticker_no_longer_fires(mut rig: Rig) -> Result<(), eyre::Report> {
    rig.service
        .create(rig.request("Heartbeat").with_cron_expression("*/10 * * * *"))
        .await?;
    let ticker = SchedulerTicker::new(rig.service.clone(), Duration::from_millis(5)).spawn();
    ticker.stop().await;

    rig.clock.advance(TimeDelta::minutes(10));
    tokio::time::sleep(Duration::from_millis(50)).await;

    eyre::ensure!(rig.runs.try_recv().is_err(), "stopped ticker fired");
    Ok(())
}
