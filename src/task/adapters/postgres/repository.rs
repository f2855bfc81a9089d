//! `PostgreSQL` repository implementation for task storage.

use super::{
    models::{NewFlowRow, TaskRecord, TaskRow},
    schema::{flows, tasks},
};
use crate::task::{
    domain::{CronSchedule, FlowId, PersistedTaskData, Task, TaskId, TaskStatus},
    ports::{PageRequest, TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};
use async_trait::async_trait;
use chrono::Utc;
use diesel::dsl::exists;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by task adapters.
pub type TaskPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed task repository.
#[derive(Debug, Clone)]
pub struct PostgresTaskRepository {
    pool: TaskPgPool,
}

impl PostgresTaskRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: TaskPgPool) -> Self {
        Self { pool }
    }

    /// Builds a connection pool for `database_url` and wraps it.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::Persistence`] when the pool cannot
    /// establish its initial connections.
    pub fn connect(database_url: &str) -> TaskRepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder()
            .build(manager)
            .map_err(TaskRepositoryError::persistence)?;
        Ok(Self::new(pool))
    }

    /// Records a flow so tasks may reference it. Registering an existing
    /// flow is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::Persistence`] when the insert fails.
    pub async fn register_flow(&self, flow_id: FlowId) -> TaskRepositoryResult<()> {
        let row = NewFlowRow {
            id: flow_id.into_inner(),
            created_at: Utc::now(),
        };
        self.run_blocking(move |connection| {
            diesel::insert_into(flows::table)
                .values(&row)
                .on_conflict_do_nothing()
                .execute(connection)
                .map_err(TaskRepositoryError::persistence)?;
            Ok(())
        })
        .await
    }

    async fn run_blocking<F, T>(&self, f: F) -> TaskRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> TaskRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TaskRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TaskRepositoryError::persistence)?
    }
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        let task_id = task.id();
        let record = to_record(task)?;

        self.run_blocking(move |connection| {
            diesel::insert_into(tasks::table)
                .values(&record)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        TaskRepositoryError::DuplicateTask(task_id)
                    }
                    _ => TaskRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update(&self, task: &Task) -> TaskRepositoryResult<()> {
        let task_id = task.id();
        let record = to_record(task)?;

        self.run_blocking(move |connection| {
            let updated = diesel::update(tasks::table.find(task_id.into_inner()))
                .set(&record)
                .execute(connection)
                .map_err(TaskRepositoryError::persistence)?;
            if updated == 0 {
                return Err(TaskRepositoryError::NotFound(task_id));
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: TaskId) -> TaskRepositoryResult<()> {
        self.run_blocking(move |connection| {
            let deleted = diesel::delete(tasks::table.find(id.into_inner()))
                .execute(connection)
                .map_err(TaskRepositoryError::persistence)?;
            if deleted == 0 {
                return Err(TaskRepositoryError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        self.run_blocking(move |connection| {
            let row = tasks::table
                .find(id.into_inner())
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(TaskRepositoryError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn list(&self, page: PageRequest) -> TaskRepositoryResult<Vec<Task>> {
        let offset = i64::try_from(page.offset).map_err(TaskRepositoryError::persistence)?;
        let limit = i64::try_from(page.limit).map_err(TaskRepositoryError::persistence)?;
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .order((tasks::created_at.asc(), tasks::id.asc()))
                .offset(offset)
                .limit(limit)
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn list_by_status(&self, status: TaskStatus) -> TaskRepositoryResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .filter(tasks::status.eq(status.as_str()))
                .order((tasks::created_at.asc(), tasks::id.asc()))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn list_by_author(&self, author_id: FlowId) -> TaskRepositoryResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .filter(tasks::author_id.eq(author_id.into_inner()))
                .order((tasks::created_at.asc(), tasks::id.asc()))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn list_recurring(&self) -> TaskRepositoryResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .filter(tasks::cron_expression.is_not_null())
                .order((tasks::created_at.asc(), tasks::id.asc()))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn flow_exists(&self, flow_id: FlowId) -> TaskRepositoryResult<bool> {
        self.run_blocking(move |connection| {
            diesel::select(exists(flows::table.find(flow_id.into_inner())))
                .get_result::<bool>(connection)
                .map_err(TaskRepositoryError::persistence)
        })
        .await
    }
}

fn to_record(task: &Task) -> TaskRepositoryResult<TaskRecord> {
    let attachments =
        serde_json::to_value(task.attachments()).map_err(TaskRepositoryError::persistence)?;

    Ok(TaskRecord {
        id: task.id().into_inner(),
        title: task.title().to_owned(),
        description: task.description().to_owned(),
        category: task.category().to_owned(),
        attachments,
        author_id: task.author_id().into_inner(),
        assignee_id: task.assignee_id().into_inner(),
        state: task.state().to_owned(),
        status: task.status().as_str().to_owned(),
        result: task.result().cloned(),
        input_request: task.input_request().cloned(),
        cron_expression: task.cron_schedule().map(|schedule| schedule.as_str().to_owned()),
        dispatched_at: task.dispatched_at(),
        created_at: task.created_at(),
        updated_at: task.updated_at(),
    })
}

fn row_to_task(row: TaskRow) -> TaskRepositoryResult<Task> {
    let TaskRow {
        id,
        title,
        description,
        category,
        attachments: persisted_attachments,
        author_id,
        assignee_id,
        state,
        status: persisted_status,
        result,
        input_request,
        cron_expression,
        dispatched_at,
        created_at,
        updated_at,
    } = row;

    let attachments = serde_json::from_value::<Vec<String>>(persisted_attachments)
        .map_err(TaskRepositoryError::persistence)?;
    let status =
        TaskStatus::try_from(persisted_status.as_str()).map_err(TaskRepositoryError::persistence)?;
    let cron_schedule = cron_expression
        .as_deref()
        .map(CronSchedule::parse)
        .transpose()
        .map_err(TaskRepositoryError::persistence)?;

    Ok(Task::from_persisted(PersistedTaskData {
        id: TaskId::from_uuid(id),
        title,
        description,
        category,
        attachments,
        author_id: FlowId::from_uuid(author_id),
        assignee_id: FlowId::from_uuid(assignee_id),
        state,
        status,
        result,
        input_request,
        cron_schedule,
        dispatched_at,
        created_at,
        updated_at,
    }))
}
