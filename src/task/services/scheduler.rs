//! Cron scheduler for recurring tasks.

use crate::task::domain::{CronSchedule, TaskDomainError, TaskId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
struct ScheduleEntry {
    schedule: CronSchedule,
    next_fire: DateTime<Utc>,
}

/// Owns the set of recurring tasks and emits due-signals.
///
/// Registration and removal take the same lock as [`Scheduler::tick`], so a
/// task unregistered before a tick starts is never reported by it.
pub struct Scheduler<C>
where
    C: Clock + Send + Sync,
{
    clock: Arc<C>,
    entries: Mutex<HashMap<TaskId, ScheduleEntry>>,
}

impl<C> Scheduler<C>
where
    C: Clock + Send + Sync,
{
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new(clock: Arc<C>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Registers `task_id` under a cron expression.
    ///
    /// Returns the first fire time, which is the first matching minute at or
    /// after the current clock instant. Re-registering a task replaces its
    /// previous schedule.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidSchedule`] when the expression is
    /// malformed or never fires.
    pub fn register(
        &self,
        task_id: TaskId,
        cron_expression: &str,
    ) -> Result<DateTime<Utc>, TaskDomainError> {
        let schedule = CronSchedule::parse(cron_expression)?;
        self.register_schedule(task_id, schedule)
    }

    /// Registers `task_id` under an already parsed schedule.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidSchedule`] when the schedule has no
    /// fire time within the search horizon.
    pub fn register_schedule(
        &self,
        task_id: TaskId,
        schedule: CronSchedule,
    ) -> Result<DateTime<Utc>, TaskDomainError> {
        let now = self.clock.utc();
        let next_fire =
            schedule
                .next_at_or_after(now)
                .ok_or_else(|| TaskDomainError::InvalidSchedule {
                    expression: schedule.as_str().to_owned(),
                    reason: "no upcoming fire time".to_owned(),
                })?;

        tracing::debug!(%task_id, schedule = %schedule, %next_fire, "registered recurring task");
        self.entries()
            .insert(task_id, ScheduleEntry { schedule, next_fire });
        Ok(next_fire)
    }

    /// Removes `task_id`; returns whether it was registered.
    #[must_use]
    pub fn unregister(&self, task_id: TaskId) -> bool {
        let removed = self.entries().remove(&task_id).is_some();
        if removed {
            tracing::debug!(%task_id, "unregistered recurring task");
        }
        removed
    }

    /// Returns tasks whose next fire time is at or before `now`.
    ///
    /// Each returned task's next fire time is recomputed strictly after
    /// `now`, so missed windows produce a single due-signal and the same
    /// instant never fires twice. Results are ordered by fire time.
    #[must_use]
    pub fn tick(&self, now: DateTime<Utc>) -> Vec<TaskId> {
        let mut entries = self.entries();
        let mut due: Vec<(DateTime<Utc>, TaskId)> = entries
            .iter()
            .filter(|(_, entry)| entry.next_fire <= now)
            .map(|(task_id, entry)| (entry.next_fire, *task_id))
            .collect();
        due.sort_unstable();

        let mut exhausted = Vec::new();
        for (_, task_id) in &due {
            let Some(entry) = entries.get_mut(task_id) else {
                continue;
            };
            let Some(next_fire) = entry.schedule.next_after(now) else {
                exhausted.push(*task_id);
                continue;
            };
            entry.next_fire = next_fire;
        }
        for task_id in exhausted {
            tracing::warn!(%task_id, "schedule has no further fire time, unregistering");
            entries.remove(&task_id);
        }

        due.into_iter().map(|(_, task_id)| task_id).collect()
    }

    /// Returns the next fire time of a registered task.
    #[must_use]
    pub fn next_fire_time(&self, task_id: TaskId) -> Option<DateTime<Utc>> {
        self.entries().get(&task_id).map(|entry| entry.next_fire)
    }

    /// Returns whether `task_id` is registered.
    #[must_use]
    pub fn is_registered(&self, task_id: TaskId) -> bool {
        self.entries().contains_key(&task_id)
    }

    /// Returns the number of registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns whether no task is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Removes every registration.
    pub fn clear(&self) {
        self.entries().clear();
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<TaskId, ScheduleEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
