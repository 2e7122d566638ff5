//! TaskRepository port - タスクレコードのキー付きストレージ
//!
//! 1 つのリポジトリは 1 種類のコレクションだけを持ちます。
//! 他のリポジトリや「どの status がどこに属するか」は知りません。
//! active / archive 間の振り分けは TaskDataService の責務です。
//!
//! # 実装
//! - **JsonFileTaskRepository**: JSON ファイル（本番用）
//! - **InMemoryTaskRepository**: テスト・一時実行用

use async_trait::async_trait;

use crate::domain::{Result, Task, TaskPage, TaskQuery};

/// TaskRepository はタスクレコードを task_id で保持する
///
/// # 設計原則
/// - 失敗した変更はコレクションを変えない
/// - `query` の絞り込み・ソート・ページングは `run_query` に共通化
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Store a new task. Fails with `DuplicateKey` if the id is taken; the
    /// collection is unchanged in that case.
    async fn add(&self, task: Task) -> Result<()>;

    async fn get_by_id(&self, task_id: &str) -> Result<Option<Task>>;

    /// Replace the stored task with the same id. Fails with `NotFound`.
    async fn update(&self, task: Task) -> Result<()>;

    /// Remove a task. Absent ids are a no-op.
    async fn delete_by_id(&self, task_id: &str) -> Result<()>;

    /// Number of stored tasks with status PENDING.
    async fn get_pending_count(&self) -> Result<usize>;

    async fn query(&self, query: &TaskQuery) -> Result<TaskPage>;
}
