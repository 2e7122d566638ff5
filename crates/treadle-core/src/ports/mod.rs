//! Ports - 抽象化レイヤー
//!
//! ストレージ、ホストのリソース情報、時刻、ID 生成、選択ポリシーは
//! すべてここの trait 越しに使います。実装は差し替え可能です
//! （JSON ファイル / InMemory リポジトリ、固定値 / 実測モニタ など）。
//!
//! # 主要な trait
//! - **TaskRepository**: タスクレコードの保存・検索
//! - **ResourceMonitor**: 利用可能な RAM / CPU
//! - **SchedulingStrategy**: 次に実行するタスクの選択
//! - **Clock**: 現在時刻（テストでは FixedClock）
//! - **TaskIdGenerator**: タスク ID の生成

pub mod clock;
pub mod id_generator;
pub mod resource_monitor;
pub mod strategy;
pub mod task_repository;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{TaskIdGenerator, UlidTaskIdGenerator};
pub use self::resource_monitor::{ResourceMonitor, ResourceSnapshot};
pub use self::strategy::{SchedulingStrategy, TaskLookup};
pub use self::task_repository::TaskRepository;
