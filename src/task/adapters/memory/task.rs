//! In-memory task repository with a flow registry.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::task::{
    domain::{FlowId, Task, TaskId, TaskStatus},
    ports::{PageRequest, TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};

/// Thread-safe in-memory task repository.
///
/// Flows are owned elsewhere; the repository only records which flow
/// identifiers exist so that task references can be resolved.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    state: Arc<RwLock<InMemoryTaskState>>,
}

#[derive(Debug, Default)]
struct InMemoryTaskState {
    tasks: HashMap<TaskId, Task>,
    flows: HashSet<FlowId>,
}

impl InMemoryTaskRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository that already knows the given flows.
    #[must_use]
    pub fn with_flows(flows: impl IntoIterator<Item = FlowId>) -> Self {
        let repository = Self::new();
        for flow_id in flows {
            repository.register_flow(flow_id);
        }
        repository
    }

    /// Records that a flow exists.
    pub fn register_flow(&self, flow_id: FlowId) {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        state.flows.insert(flow_id);
    }

    fn read(&self) -> TaskRepositoryResult<RwLockReadGuard<'_, InMemoryTaskState>> {
        self.state.read().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> TaskRepositoryResult<RwLockWriteGuard<'_, InMemoryTaskState>> {
        self.state.write().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn collect_sorted(&self, predicate: impl Fn(&Task) -> bool) -> TaskRepositoryResult<Vec<Task>> {
        let state = self.read()?;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|task| predicate(task))
            .cloned()
            .collect();
        tasks.sort_by_key(|task| (task.created_at(), task.id()));
        Ok(tasks)
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        let mut state = self.write()?;
        if state.tasks.contains_key(&task.id()) {
            return Err(TaskRepositoryError::DuplicateTask(task.id()));
        }
        state.tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn update(&self, task: &Task) -> TaskRepositoryResult<()> {
        let mut state = self.write()?;
        let slot = state
            .tasks
            .get_mut(&task.id())
            .ok_or(TaskRepositoryError::NotFound(task.id()))?;
        *slot = task.clone();
        Ok(())
    }

    async fn delete(&self, id: TaskId) -> TaskRepositoryResult<()> {
        let mut state = self.write()?;
        state
            .tasks
            .remove(&id)
            .map(|_| ())
            .ok_or(TaskRepositoryError::NotFound(id))
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        let state = self.read()?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn list(&self, page: PageRequest) -> TaskRepositoryResult<Vec<Task>> {
        let tasks = self.collect_sorted(|_| true)?;
        Ok(tasks
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect())
    }

    async fn list_by_status(&self, status: TaskStatus) -> TaskRepositoryResult<Vec<Task>> {
        self.collect_sorted(|task| task.status() == status)
    }

    async fn list_by_author(&self, author_id: FlowId) -> TaskRepositoryResult<Vec<Task>> {
        self.collect_sorted(|task| task.author_id() == author_id)
    }

    async fn list_recurring(&self) -> TaskRepositoryResult<Vec<Task>> {
        self.collect_sorted(Task::is_recurring)
    }

    async fn flow_exists(&self, flow_id: FlowId) -> TaskRepositoryResult<bool> {
        let state = self.read()?;
        Ok(state.flows.contains(&flow_id))
    }
}
