//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **JsonFileTaskRepository**: コレクションごとに 1 つの JSON ファイル（永続）
//! - **InMemoryTaskRepository**: テスト・dry run 用（揮発）
//! - **PriorityStrategy**: 依存フィルタ + 優先度順
//! - **StaticResourceMonitor**: 固定容量のモニタ

pub mod json_repository;
pub mod memory_repository;
pub mod priority_strategy;
pub mod static_monitor;

pub use self::json_repository::JsonFileTaskRepository;
pub use self::memory_repository::InMemoryTaskRepository;
pub use self::priority_strategy::{DEFAULT_MAX_BATCH, PriorityStrategy};
pub use self::static_monitor::StaticResourceMonitor;
