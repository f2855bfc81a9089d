//! Row mapping and constraint tests for the `PostgreSQL` repository.

use super::helpers::{PgContext, PinnedClock, context};
use rstest::rstest;
use serde_json::json;
use taskforge::task::{
    domain::{CronSchedule, FlowId, NewTask, Task, TaskStatus, TaskTransition},
    ports::{PageRequest, TaskRepository, TaskRepositoryError},
};

fn sample_data(flow: FlowId, cron: Option<&str>) -> NewTask {
    NewTask {
        title: "Index mailbox".to_owned(),
        description: "Full re-index".to_owned(),
        category: "search".to_owned(),
        attachments: vec!["s3://mail/2026-03".to_owned()],
        author_id: flow,
        assignee_id: flow,
        state: "indexing".to_owned(),
        input_request: Some(json!({"folders": ["inbox", "sent"]})),
        cron_schedule: cron.map(|expr| CronSchedule::parse(expr).expect("valid schedule")),
    }
}

fn sample_task(clock: &PinnedClock, flow: FlowId, cron: Option<&str>) -> Task {
    Task::new(sample_data(flow, cron), clock).expect("valid task")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stored_task_round_trips_every_field(context: Option<PgContext>) {
    let Some(ctx) = context else {
        return;
    };
    let clock = PinnedClock::at("2026-03-02T10:15:30.123456Z");
    let flow = FlowId::new();
    ctx.repository.register_flow(flow).await.expect("flow registered");
    let mut task = sample_task(&clock, flow, Some("15 10 * * mon-fri"));
    ctx.repository.store(&task).await.expect("store succeeds");

    task.apply(TaskTransition::Dispatch, &clock)
        .expect("dispatch permitted");
    task.apply(TaskTransition::Complete(json!({"indexed": 812})), &clock)
        .expect("completion permitted");
    ctx.repository.update(&task).await.expect("update succeeds");
    let found = ctx
        .repository
        .find_by_id(task.id())
        .await
        .expect("lookup succeeds");

    assert_eq!(found, Some(task));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn long_title_and_category_are_stored_whole(context: Option<PgContext>) {
    let Some(ctx) = context else {
        return;
    };
    let clock = PinnedClock::at("2026-03-02T10:15:30Z");
    let flow = FlowId::new();
    ctx.repository.register_flow(flow).await.expect("flow registered");
    let task = Task::new(
        NewTask {
            title: "t".repeat(300),
            category: "c".repeat(150),
            ..sample_data(flow, None)
        },
        &clock,
    )
    .expect("valid task");

    ctx.repository.store(&task).await.expect("store succeeds");
    let found = ctx
        .repository
        .find_by_id(task.id())
        .await
        .expect("lookup succeeds")
        .expect("task stored");

    assert_eq!(found.title().len(), 300);
    assert_eq!(found.category().len(), 150);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn duplicate_and_missing_rows_are_reported(context: Option<PgContext>) {
    let Some(ctx) = context else {
        return;
    };
    let clock = PinnedClock::at("2026-03-02T10:00:00Z");
    let flow = FlowId::new();
    ctx.repository.register_flow(flow).await.expect("flow registered");
    let stored = sample_task(&clock, flow, None);
    let never_stored = sample_task(&clock, flow, None);
    ctx.repository.store(&stored).await.expect("store succeeds");

    let duplicate = ctx.repository.store(&stored).await;
    let update_missing = ctx.repository.update(&never_stored).await;
    let delete_missing = ctx.repository.delete(never_stored.id()).await;

    assert!(matches!(duplicate, Err(TaskRepositoryError::DuplicateTask(_))));
    assert!(matches!(update_missing, Err(TaskRepositoryError::NotFound(_))));
    assert!(matches!(delete_missing, Err(TaskRepositoryError::NotFound(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_flow_violates_foreign_key(context: Option<PgContext>) {
    let Some(ctx) = context else {
        return;
    };
    let clock = PinnedClock::at("2026-03-02T10:00:00Z");
    let task = sample_task(&clock, FlowId::new(), None);

    let stored = ctx.repository.store(&task).await;

    assert!(matches!(stored, Err(TaskRepositoryError::Persistence(_))));
    assert!(!ctx.repository.flow_exists(task.author_id()).await.expect("lookup succeeds"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn listings_filter_in_the_database(context: Option<PgContext>) {
    let Some(ctx) = context else {
        return;
    };
    let flow = FlowId::new();
    ctx.repository.register_flow(flow).await.expect("flow registered");
    let recurring = sample_task(&PinnedClock::at("2026-03-02T10:00:00Z"), flow, Some("0 * * * *"));
    let one_shot = sample_task(&PinnedClock::at("2026-03-02T10:00:01Z"), flow, None);
    ctx.repository.store(&one_shot).await.expect("store succeeds");
    ctx.repository.store(&recurring).await.expect("store succeeds");

    let all = ctx
        .repository
        .list(PageRequest::default())
        .await
        .expect("list succeeds");
    let second_page = ctx
        .repository
        .list(PageRequest::new(1, 1))
        .await
        .expect("list succeeds");
    let recurring_only = ctx.repository.list_recurring().await.expect("list succeeds");
    let processing = ctx
        .repository
        .list_by_status(TaskStatus::Processing)
        .await
        .expect("list succeeds");

    assert_eq!(all, vec![recurring.clone(), one_shot.clone()]);
    assert_eq!(second_page, vec![one_shot]);
    assert_eq!(recurring_only, vec![recurring]);
    assert!(processing.is_empty());
}
