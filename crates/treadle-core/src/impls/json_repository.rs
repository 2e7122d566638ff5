//! JSON file task repository.
//!
//! The whole collection is kept in memory and rewritten to disk after every
//! mutation as one JSON object keyed by task id. Writes go to a temporary
//! file in the same directory which is synced and renamed over the target,
//! so a crash leaves either the old or the new collection, never a mix.
//!
//! Every mutation costs a full rewrite. That is fine for the few hundred
//! tasks a single host schedules but is the first thing to replace (with an
//! embedded KV store, one record per key) if volumes grow.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::domain::{
    Result, SchedulerError, Task, TaskId, TaskPage, TaskQuery, TaskStatus, run_query,
};
use crate::domain::task::DEFAULT_DEADLINE_DAYS;
use crate::ports::TaskRepository;

pub struct JsonFileTaskRepository {
    path: PathBuf,
    tasks: Mutex<BTreeMap<TaskId, Task>>,
}

impl JsonFileTaskRepository {
    /// Open (or lazily create) the collection stored at `path`.
    ///
    /// A missing or empty file is an empty collection. Records that no
    /// longer decode are skipped with a warning; a file that is not a JSON
    /// object at all is an error.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let tasks = load(&path).await?;
        tracing::debug!(path = %path.display(), count = tasks.len(), "opened task repository");
        Ok(Self {
            path,
            tasks: Mutex::new(tasks),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, tasks: &BTreeMap<TaskId, Task>) -> Result<()> {
        let body = serde_json::to_vec_pretty(tasks)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SchedulerError::io(parent, e))?;
        }

        let tmp_path = temp_path(&self.path);
        if let Err(e) = write_and_swap(&tmp_path, &self.path, &body).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await
                && cleanup.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!(path = %tmp_path.display(), error = %cleanup, "failed to remove temp file");
            }
            return Err(e);
        }
        Ok(())
    }
}

/// Write `body` to `tmp_path`, sync it, then rename it over `path`.
async fn write_and_swap(tmp_path: &Path, path: &Path, body: &[u8]) -> Result<()> {
    let mut file = tokio::fs::File::create(tmp_path)
        .await
        .map_err(|e| SchedulerError::io(tmp_path, e))?;
    file.write_all(body)
        .await
        .map_err(|e| SchedulerError::io(tmp_path, e))?;
    file.sync_all()
        .await
        .map_err(|e| SchedulerError::io(tmp_path, e))?;
    drop(file);

    tokio::fs::rename(tmp_path, path)
        .await
        .map_err(|e| SchedulerError::io(path, e))
}

async fn load(path: &Path) -> Result<BTreeMap<TaskId, Task>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(SchedulerError::io(path, e)),
    };
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(&content)?;
    let mut tasks = BTreeMap::new();
    for (key, mut value) in raw {
        fill_default_deadline(&mut value);
        match serde_json::from_value::<Task>(value) {
            Ok(task) => {
                if task.task_id.as_str() != key {
                    tracing::warn!(
                        path = %path.display(),
                        key = %key,
                        task_id = %task.task_id,
                        "stored key does not match task id, keeping task id"
                    );
                }
                tasks.insert(task.task_id.clone(), task);
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    task_id = %key,
                    error = %e,
                    "skipping task record that failed to decode"
                );
            }
        }
    }
    Ok(tasks)
}

/// Records written before deadlines were tracked get the default deadline
/// counted from their creation time.
fn fill_default_deadline(record: &mut serde_json::Value) {
    let Some(fields) = record.as_object_mut() else {
        return;
    };
    if fields.get("deadline").is_some_and(|d| !d.is_null()) {
        return;
    }
    let Some(created_at) = fields
        .get("created_at")
        .and_then(|c| serde_json::from_value::<DateTime<Utc>>(c.clone()).ok())
    else {
        return;
    };
    let deadline = created_at + Duration::days(DEFAULT_DEADLINE_DAYS);
    if let Ok(deadline) = serde_json::to_value(deadline) {
        fields.insert("deadline".to_string(), deadline);
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tasks.json".to_string());
    path.with_file_name(format!(".{file_name}.tmp"))
}

#[async_trait]
impl TaskRepository for JsonFileTaskRepository {
    async fn add(&self, task: Task) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        if tasks.contains_key(&task.task_id) {
            return Err(SchedulerError::DuplicateKey(task.task_id));
        }
        let task_id = task.task_id.clone();
        tasks.insert(task_id.clone(), task);
        if let Err(e) = self.persist(&tasks).await {
            tasks.remove(&task_id);
            return Err(e);
        }
        Ok(())
    }

    async fn get_by_id(&self, task_id: &str) -> Result<Option<Task>> {
        Ok(self.tasks.lock().await.get(task_id).cloned())
    }

    async fn update(&self, task: Task) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        if !tasks.contains_key(&task.task_id) {
            return Err(SchedulerError::NotFound(task.task_id));
        }
        let task_id = task.task_id.clone();
        let previous = tasks.insert(task_id.clone(), task);
        if let Err(e) = self.persist(&tasks).await {
            if let Some(previous) = previous {
                tasks.insert(task_id, previous);
            }
            return Err(e);
        }
        Ok(())
    }

    async fn delete_by_id(&self, task_id: &str) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        let Some(removed) = tasks.remove(task_id) else {
            return Ok(());
        };
        if let Err(e) = self.persist(&tasks).await {
            tasks.insert(removed.task_id.clone(), removed);
            return Err(e);
        }
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
