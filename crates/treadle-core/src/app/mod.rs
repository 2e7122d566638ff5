//! App - アプリケーション層
//!
//! data service と ports を組み合わせたコンポーネント。
//!
//! # 主要コンポーネント
//! - **Scheduler**: Strategy でバッチを選び、RUNNING にしたタスクを 1 件ずつ払い出す
//! - **DeadlineReaper**: 期限切れの実行中タスクを定期的に FAILED にする

pub mod reaper;
pub mod scheduler;

pub use self::reaper::{DeadlineReaper, ReaperHandle};
pub use self::scheduler::Scheduler;
