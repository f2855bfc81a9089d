//! Diesel schema for task persistence.

diesel::table! {
    /// Task records.
    tasks (id) {
        /// Internal task identifier.
        id -> Uuid,
        /// Short task title.
        title -> Text,
        /// Free-form description.
        description -> Text,
        /// Task category.
        category -> Text,
        /// Ordered attachment references as a JSON array of strings.
        attachments -> Jsonb,
        /// Authoring flow.
        author_id -> Uuid,
        /// Assigned flow.
        assignee_id -> Uuid,
        /// Opaque workflow marker.
        state -> Text,
        /// Lifecycle status.
        #[max_length = 20]
        status -> Varchar,
        /// Result of the latest finished run.
        result -> Nullable<Jsonb>,
        /// Triggering input.
        input_request -> Nullable<Jsonb>,
        /// Five-field cron expression for recurring tasks.
        cron_expression -> Nullable<Text>,
        /// Dispatch timestamp of the current run.
        dispatched_at -> Nullable<Timestamptz>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Known flows that may author or be assigned tasks.
    flows (id) {
        /// Flow identifier.
        id -> Uuid,
        /// Registration timestamp.
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(tasks, flows);
