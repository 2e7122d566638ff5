//! SchedulingStrategy port - 候補から次に実行するタスクを選ぶ
//!
//! # 設計原則
//! - Strategy はタスクを変更しない（RUNNING への遷移は Scheduler が永続化）
//! - 前提タスクの状態は TaskLookup 経由で参照する

use async_trait::async_trait;

use crate::domain::{Result, Task};

/// Resolves prerequisite ids to their current records.
#[async_trait]
pub trait TaskLookup: Send + Sync {
    async fn get_task_by_id(&self, task_id: &str) -> Result<Option<Task>>;
}

/// Selection over a candidate set.
///
/// Implementations must not modify any task; the scheduler persists the
/// status change for whatever is returned.
#[async_trait]
pub trait SchedulingStrategy: Send + Sync {
    /// Return the candidates cleared to run now, in dispatch order.
    async fn select_tasks(
        &self,
        pending_tasks: Vec<Task>,
        available_ram_mb: u64,
        available_cpu_cores: f64,
    ) -> Result<Vec<Task>>;
}
