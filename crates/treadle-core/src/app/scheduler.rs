//! Scheduler - ローカルにキャッシュしたバッチからタスクを 1 件ずつ払い出す
//!
//! # フロー（キャッシュが空のときだけ補充）
//! 1. ホストのリソースを取得（モニタ失敗時は容量ゼロ扱い）
//! 2. active リポジトリから NEW と PENDING の候補を取得
//! 3. Strategy にバッチを選ばせる
//! 4. 選ばれたタスクをすべて RUNNING にする（保存済みレコードに対して CAS）
//! 5. 保存された RUNNING レコードをキャッシュし、先頭を返す
//!
//! # 注意
//! - 4 はバッチ全体について完了してから返すため、4 と 5 の間でクラッシュすると
//!   どの実行側にも渡っていない RUNNING タスクが残る
//! - ここでは再キューしない（外部の supervisor の責務）

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::SchedulerConfig;
use crate::domain::{Result, SchedulerError, Task, TaskQuery, TaskStatus};
use crate::ports::{ResourceMonitor, ResourceSnapshot, SchedulingStrategy};
use crate::service::TaskDataService;

/// Statuses a task may be claimed from.
const DISPATCHABLE: [TaskStatus; 2] = [TaskStatus::New, TaskStatus::Pending];

/// Scheduler は選択済みバッチを保持し、実行側へ払い出す
///
/// # 並行性
/// - 補充中はキャッシュのロックを保持する（同時に 2 回選択しない）
/// - RUNNING への遷移は CAS なので、他の Scheduler と二重払い出しにならない
pub struct Scheduler {
    monitor: Arc<dyn ResourceMonitor>,
    strategy: Arc<dyn SchedulingStrategy>,
    data_service: Arc<TaskDataService>,
    config: SchedulerConfig,
    /// Selected, marked RUNNING, not yet handed out.
    next_tasks_to_run: Mutex<VecDeque<Task>>,
}

impl Scheduler {
    pub fn new(
        monitor: Arc<dyn ResourceMonitor>,
        strategy: Arc<dyn SchedulingStrategy>,
        data_service: Arc<TaskDataService>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            monitor,
            strategy,
            data_service,
            config,
            next_tasks_to_run: Mutex::new(VecDeque::new()),
        }
    }

    /// Persist a new task. The data service rejects anything not NEW.
    pub async fn submit_task(&self, task: Task) -> Result<()> {
        self.data_service.add_task(task).await
    }

    /// Next task to execute, already marked RUNNING, or `None` when nothing
    /// is runnable.
    pub async fn get_next_task(&self) -> Result<Option<Task>> {
        // Held across the refill: one selection pass at a time.
        let mut queue = self.next_tasks_to_run.lock().await;
        if let Some(task) = queue.pop_front() {
            return Ok(Some(task));
        }

        let resources = match self.monitor.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "resource monitor failed, assuming no capacity");
                ResourceSnapshot::zero()
            }
        };

        let mut candidates = Vec::new();
        for status in DISPATCHABLE {
            let query = TaskQuery::new()
                .status(status)
                .limit(self.config.candidate_page_size);
            candidates.extend(self.data_service.query_active_tasks(&query).await?.tasks);
        }
        let candidate_count = candidates.len();

        let selected = self
            .strategy
            .select_tasks(
                candidates,
                resources.available_ram_mb,
                resources.available_cpu_cores,
            )
            .await?;
        if selected.is_empty() {
            tracing::debug!(candidates = candidate_count, "no runnable tasks");
            return Ok(None);
        }

        let selected_count = selected.len();
        for task in selected {
            // The stored record is claimed, not the candidate copy, so edits
            // made since the candidate query survive.
            match self
                .data_service
                .transition_status(task.task_id.as_str(), &DISPATCHABLE, TaskStatus::Running)
                .await
            {
                Ok(running) => queue.push_back(running),
                Err(e @ (SchedulerError::StatusConflict { .. } | SchedulerError::NotFound(_))) => {
                    tracing::warn!(task_id = %task.task_id, error = %e, "task changed before dispatch, skipping");
                }
                Err(e) => return Err(e),
            }
        }

        tracing::debug!(
            candidates = candidate_count,
            selected = selected_count,
            dispatched = queue.len(),
            "run queue refilled"
        );
        Ok(queue.pop_front())
    }

    /// Report progress or an outcome (completion, failure, checkpoint, re-queue).
    pub async fn update_task(&self, task: Task) -> Result<()> {
        self.data_service.update_task(task).await
    }

    /// PENDING tasks, for monitoring. NEW and RUNNING are not included.
    pub async fn get_pending_tasks(&self) -> Result<Vec<Task>> {
        let query = TaskQuery::new()
            .status(TaskStatus::Pending)
            .limit(self.config.monitor_page_size);
        Ok(self.data_service.query_active_tasks(&query).await?.tasks)
    }

    /// Tasks already claimed but not yet handed out.
    pub async fn queued_len(&self) -> usize {
        self.next_tasks_to_run.lock().await.len()
    }
}
