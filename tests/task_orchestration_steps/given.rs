//! Given steps for task orchestration BDD scenarios.

use super::world::{OrchestrationWorld, parse_instant, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::given;
use taskforge::task::{domain::FlowId, services::CreateTaskRequest};

#[given(r#"the clock reads "{instant}""#)]
fn clock_reads(world: &mut OrchestrationWorld, instant: String) -> Result<(), eyre::Report> {
    world.clock.set(parse_instant(&instant)?);
    Ok(())
}

#[given("a registered flow")]
fn registered_flow(world: &mut OrchestrationWorld) {
    let flow = FlowId::new();
    world.repository.register_flow(flow);
    world.flow = Some(flow);
}

#[given(r#"a task titled "{title}""#)]
fn task_titled(world: &mut OrchestrationWorld, title: String) -> Result<(), eyre::Report> {
    let flow = world.flow()?;
    let created = run_async(
        world
            .service
            .create(CreateTaskRequest::new(title, "email", flow, flow)),
    )
    .wrap_err("create task for scenario")?;
    world.task = Some(created);
    Ok(())
}

#[given(r#"a recurring task titled "{title}" on schedule "{schedule}""#)]
fn recurring_task_titled(
    world: &mut OrchestrationWorld,
    title: String,
    schedule: String,
) -> Result<(), eyre::Report> {
    let flow = world.flow()?;
    let created = run_async(
        world.service.create(
            CreateTaskRequest::new(title, "monitoring", flow, flow)
                .with_cron_expression(schedule),
        ),
    )
    .wrap_err("create recurring task for scenario")?;
    world.task = Some(created);
    Ok(())
}

#[given("the task has been dispatched")]
fn task_has_been_dispatched(world: &mut OrchestrationWorld) -> Result<(), eyre::Report> {
    let task_id = world.task()?.id();
    let dispatched =
        run_async(world.service.dispatch(task_id)).wrap_err("dispatch task in scenario setup")?;
    world.task = Some(dispatched);
    Ok(())
}
