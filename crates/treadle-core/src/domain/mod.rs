//! Domain - ドメインモデル
//!
//! # 構成
//! - **task**: タスク本体（Task, Priority）
//! - **status**: 状態機械（TaskStatus）と保存先の分類（StorageTier）
//! - **ids**: TaskId
//! - **query**: 絞り込み・ソート・keyset ページング（TaskQuery, run_query）
//! - **errors**: エラー型（SchedulerError）

pub mod errors;
pub mod ids;
pub mod query;
pub mod status;
pub mod task;

pub use errors::{Result, SchedulerError};
pub use ids::TaskId;
pub use query::{PageKey, SortField, TaskPage, TaskQuery, run_query};
pub use status::{StorageTier, TaskStatus};
pub use task::{Priority, Task};
