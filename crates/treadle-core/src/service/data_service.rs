//! TaskDataService - 2 つのリポジトリを 1 つの論理ストアとして扱う
//!
//! NEW / PENDING / RUNNING のタスクは *active*、終了したタスクは *archive* に置きます。
//! 書き込みは受け取ったレコードの status で振り分け、tier をまたぐ変更では
//! 新しい側へ upsert してから古い側を削除します。
//!
//! # 設計原則
//! - サービス全体の write guard で書き込みを直列化する
//!   （upsert と削除の間に他の書き込みが割り込まない）
//! - 1 つの task_id は常にどちらか一方のリポジトリにだけ存在する
//! - 状態遷移（`transition_status`）は保存済みレコードに適用する
//!   （呼び出し側の古いコピーで他の変更を上書きしない）

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::TaskDataConfig;
use crate::domain::{
    Result, SchedulerError, StorageTier, Task, TaskId, TaskPage, TaskQuery, TaskStatus,
};
use crate::impls::JsonFileTaskRepository;
use crate::ports::{TaskLookup, TaskRepository};

pub struct TaskDataService {
    active: Arc<dyn TaskRepository>,
    archive: Arc<dyn TaskRepository>,
    write_guard: Mutex<()>,
}

impl TaskDataService {
    pub fn new(active: Arc<dyn TaskRepository>, archive: Arc<dyn TaskRepository>) -> Self {
        Self {
            active,
            archive,
            write_guard: Mutex::new(()),
        }
    }

    /// Open the JSON-backed repositories named by `config`.
    ///
    /// Fails with `Configuration` when no data directory is set.
    pub async fn open(config: &TaskDataConfig) -> Result<Self> {
        let (active_path, archive_path) = config.repo_paths()?;
        let active = JsonFileTaskRepository::open(&active_path).await?;
        let archive = JsonFileTaskRepository::open(&archive_path).await?;
        tracing::info!(
            active = %active_path.display(),
            archive = %archive_path.display(),
            "task data service initialized"
        );
        Ok(Self::new(Arc::new(active), Arc::new(archive)))
    }

    pub fn active(&self) -> &Arc<dyn TaskRepository> {
        &self.active
    }

    pub fn archive(&self) -> &Arc<dyn TaskRepository> {
        &self.archive
    }

    fn repos_for(&self, tier: StorageTier) -> (&dyn TaskRepository, &dyn TaskRepository) {
        match tier {
            StorageTier::Active => (self.active.as_ref(), self.archive.as_ref()),
            StorageTier::Archive => (self.archive.as_ref(), self.active.as_ref()),
        }
    }

    /// Store a freshly created task. Only NEW tasks are accepted.
    pub async fn add_task(&self, task: Task) -> Result<()> {
        if task.status != TaskStatus::New {
            return Err(SchedulerError::InvalidState {
                task_id: task.task_id,
                status: task.status,
            });
        }
        task.validate()?;

        let _guard = self.write_guard.lock().await;
        // The id must not already be in use anywhere, archive included.
        if self.archive.get_by_id(task.task_id.as_str()).await?.is_some() {
            return Err(SchedulerError::DuplicateKey(task.task_id));
        }
        tracing::debug!(task_id = %task.task_id, agent_id = %task.agent_id, "adding task");
        self.active.add(task).await
    }

    /// Active repository first, then the archive.
    pub async fn get_task_by_id(&self, task_id: &str) -> Result<Option<Task>> {
        if let Some(task) = self.active.get_by_id(task_id).await? {
            return Ok(Some(task));
        }
        self.archive.get_by_id(task_id).await
    }

    /// Replace a task, moving it between repositories when its status
    /// changes tier. Re-queueing a finished task brings it back to active.
    pub async fn update_task(&self, task: Task) -> Result<()> {
        task.validate()?;
        let _guard = self.write_guard.lock().await;
        self.store_in_tier(task).await
    }

    /// Move a task to `status`, but only if its stored status is one of
    /// `expected`. The stored record is the one rewritten, so fields changed
    /// by other writers since the caller last read it are kept. Returns the
    /// record as stored.
    pub async fn transition_status(
        &self,
        task_id: &str,
        expected: &[TaskStatus],
        status: TaskStatus,
    ) -> Result<Task> {
        self.transition_status_if(task_id, expected, status, |_| true)
            .await?
            .ok_or_else(|| SchedulerError::NotFound(TaskId::from(task_id)))
    }

    /// `transition_status` with an extra check on the stored record.
    /// `Ok(None)` when `condition` rejects it; nothing is written then.
    pub async fn transition_status_if<F>(
        &self,
        task_id: &str,
        expected: &[TaskStatus],
        status: TaskStatus,
        condition: F,
    ) -> Result<Option<Task>>
    where
        F: FnOnce(&Task) -> bool + Send,
    {
        let _guard = self.write_guard.lock().await;

        let current = self
            .get_task_by_id(task_id)
            .await?
            .ok_or_else(|| SchedulerError::NotFound(TaskId::from(task_id)))?;
        if !expected.contains(&current.status) {
            return Err(SchedulerError::StatusConflict {
                task_id: current.task_id,
                expected: expected.to_vec(),
                actual: current.status,
            });
        }
        if !condition(&current) {
            return Ok(None);
        }

        let updated = current.with_status(status);
        self.store_in_tier(updated.clone()).await?;
        Ok(Some(updated))
    }

    /// Update the task in whichever repository currently holds it, without
    /// any tier routing. Fails with `NotFound` if neither holds it.
    pub async fn update_in_place(&self, task: Task) -> Result<()> {
        task.validate()?;
        let _guard = self.write_guard.lock().await;
        match self.active.update(task.clone()).await {
            Err(e) if e.is_not_found() => self.archive.update(task).await,
            result => result,
        }
    }

    async fn store_in_tier(&self, task: Task) -> Result<()> {
        let tier = task.status.tier();
        let (target, other) = self.repos_for(tier);
        let task_id = task.task_id.clone();

        match target.update(task.clone()).await {
            Err(e) if e.is_not_found() => target.add(task).await?,
            result => result?,
        }

        if other.get_by_id(task_id.as_str()).await?.is_some() {
            match other.delete_by_id(task_id.as_str()).await {
                Ok(()) => {
                    tracing::info!(task_id = %task_id, to = ?tier, "task migrated");
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    tracing::error!(
                        task_id = %task_id,
                        error = %e,
                        "task stored in both repositories, removal from previous tier failed"
                    );
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Query the active repository only.
    pub async fn query_active_tasks(&self, query: &TaskQuery) -> Result<TaskPage> {
        self.active.query(query).await
    }

    /// Query both repositories as one result set, active rows first.
    ///
    /// Meant for reporting. The active portion is always read from its
    /// first row and its own cursor is dropped; the returned cursor (if any)
    /// points into the archive. Passing a cursor therefore skips the active
    /// repository and resumes inside the archive, so paging cannot resume
    /// partway through the active rows.
    pub async fn query_all_tasks(&self, query: &TaskQuery) -> Result<TaskPage> {
        let tier = query.status.map(TaskStatus::tier);
        let mut tasks = Vec::new();
        let mut next_key = None;

        if query.exclusive_start_key.is_none() && tier != Some(StorageTier::Archive) {
            let active_query = TaskQuery {
                exclusive_start_key: None,
                ..query.clone()
            };
            tasks.extend(self.active.query(&active_query).await?.tasks);
        }

        if tasks.len() < query.limit && tier != Some(StorageTier::Active) {
            let archive_query = TaskQuery {
                limit: query.limit - tasks.len(),
                ..query.clone()
            };
            let page = self.archive.query(&archive_query).await?;
            tasks.extend(page.tasks);
            next_key = page.next_key;
        }

        Ok(TaskPage { tasks, next_key })
    }

    pub async fn get_pending_count(&self) -> Result<usize> {
        self.active.get_pending_count().await
    }
}

#[async_trait]
impl TaskLookup for TaskDataService {
    async fn get_task_by_id(&self, task_id: &str) -> Result<Option<Task>> {
        TaskDataService::get_task_by_id(self, task_id).await
    }
}
