//! Diesel row models for task persistence.

use super::schema::{flows, tasks};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for task records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    pub id: uuid::Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub attachments: Value,
    pub author_id: uuid::Uuid,
    pub assignee_id: uuid::Uuid,
    pub state: String,
    pub status: String,
    pub result: Option<Value>,
    pub input_request: Option<Value>,
    pub cron_expression: Option<String>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert and full-replacement model for task records.
///
/// `None` values are written as `NULL` on update so a cleared result or
/// dispatch timestamp is persisted.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = tasks)]
#[diesel(treat_none_as_null = true)]
pub struct TaskRecord {
    pub id: uuid::Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub attachments: Value,
    pub author_id: uuid::Uuid,
    pub assignee_id: uuid::Uuid,
    pub state: String,
    pub status: String,
    pub result: Option<Value>,
    pub input_request: Option<Value>,
    pub cron_expression: Option<String>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert model for flow registrations.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = flows)]
pub struct NewFlowRow {
    pub id: uuid::Uuid,
    pub created_at: DateTime<Utc>,
}
