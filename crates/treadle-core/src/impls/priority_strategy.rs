//! Dependency-aware priority strategy.
//!
//! Selection:
//! 1. drop candidates with a prerequisite that is still NEW, PENDING,
//!    RUNNING or FAILED (unknown and finished prerequisites do not block)
//! 2. order by (priority, created_at), task id as final tie-break
//! 3. keep the first `max_batch`
//!
//! Resource figures are accepted but not yet used for admission.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Result, Task};
use crate::ports::{SchedulingStrategy, TaskLookup};

pub const DEFAULT_MAX_BATCH: usize = 10;

pub struct PriorityStrategy {
    lookup: Arc<dyn TaskLookup>,
    max_batch: usize,
}

impl PriorityStrategy {
    pub fn new(lookup: Arc<dyn TaskLookup>) -> Self {
        Self::with_max_batch(lookup, DEFAULT_MAX_BATCH)
    }

    pub fn with_max_batch(lookup: Arc<dyn TaskLookup>, max_batch: usize) -> Self {
        Self { lookup, max_batch }
    }

    /// Id of the first prerequisite that keeps `task` from running, if any.
    async fn blocking_prerequisite(&self, task: &Task) -> Result<Option<String>> {
        for prerequisite in &task.blocked_by {
            let Some(dep) = self.lookup.get_task_by_id(prerequisite.as_str()).await? else {
                continue;
            };
            if dep.status.is_blocking_dependency() {
                return Ok(Some(prerequisite.to_string()));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl SchedulingStrategy for PriorityStrategy {
    async fn select_tasks(
        &self,
        pending_tasks: Vec<Task>,
        available_ram_mb: u64,
        available_cpu_cores: f64,
    ) -> Result<Vec<Task>> {
        tracing::trace!(
            candidates = pending_tasks.len(),
            available_ram_mb,
            available_cpu_cores,
            "selecting tasks"
        );

        let mut unblocked = Vec::with_capacity(pending_tasks.len());
        for task in pending_tasks {
            match self.blocking_prerequisite(&task).await? {
                Some(prerequisite) => {
                    tracing::debug!(task_id = %task.task_id, blocked_by = %prerequisite, "task blocked");
                }
                None => unblocked.push(task),
            }
        }

        unblocked.sort_by(|a, b| {
            (a.priority, a.created_at)
                .cmp(&(b.priority, b.created_at))
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        unblocked.truncate(self.max_batch);
        Ok(unblocked)
    }
}
