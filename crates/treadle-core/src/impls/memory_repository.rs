//! In-memory task repository (tests, ephemeral runs).

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    Result, SchedulerError, Task, TaskId, TaskPage, TaskQuery, TaskStatus, run_query,
};
use crate::ports::TaskRepository;

#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: Mutex<HashMap<TaskId, Task>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn add(&self, task: Task) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        if tasks.contains_key(&task.task_id) {
            return Err(SchedulerError::DuplicateKey(task.task_id));
        }
        tasks.insert(task.task_id.clone(), task);
        Ok(())
    }

    async fn get_by_id(&self, task_id: &str) -> Result<Option<Task>> {
        Ok(self.tasks.lock().await.get(task_id).cloned())
    }

    async fn update(&self, task: Task) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        match tasks.get_mut(&task.task_id) {
            Some(slot) => {
                *slot = task;
                Ok(())
            }
            None => Err(SchedulerError::NotFound(task.task_id)),
        }
    }

    async fn delete_by_id(&self, task_id: &str) -> Result<()> {
        self.tasks.lock().await.remove(task_id);
        Ok(())
    }

    async fn get_pending_count(&self) -> Result<usize> {
        let tasks = self.tasks.lock().await;
        Ok(tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .count())
    }

    async fn query(&self, query: &TaskQuery) -> Result<TaskPage> {
        let tasks = self.tasks.lock().await;
        Ok(run_query(tasks.values(), query))
    }
}
