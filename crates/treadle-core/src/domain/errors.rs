//! Errors - エラー型
//!
//! core 全体で `SchedulerError` 1 つに集約し、`Result<T>` で返します。
//! 自動リトライは core では行いません（呼び出し側の判断）。

use std::path::PathBuf;

use thiserror::Error;

use super::{TaskId, TaskStatus};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("task {0} already exists")]
    DuplicateKey(TaskId),

    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("task {task_id} has status {status}; new tasks must start as NEW")]
    InvalidState { task_id: TaskId, status: TaskStatus },

    #[error("task {task_id} is {actual}, expected one of {expected:?}")]
    StatusConflict {
        task_id: TaskId,
        expected: Vec<TaskStatus>,
        actual: TaskStatus,
    },

    #[error("task {task_id} is invalid: {reason}")]
    InvalidTask { task_id: TaskId, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("resource monitor error: {0}")]
    Monitor(String),
}

impl SchedulerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SchedulerError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SchedulerError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
