//! treadle-core
//!
//! エージェント向けタスクスケジューラの中核。
//! 優先度・リソース見積り・前提タスクを持つタスクを active / archive の
//! 2 つのリポジトリに永続化し、実行側へ 1 件ずつ払い出します。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（Task, TaskStatus, TaskId, TaskQuery, SchedulerError）
//! - **ports**: 抽象化レイヤー（TaskRepository, ResourceMonitor, SchedulingStrategy, Clock, TaskIdGenerator）
//! - **impls**: 実装（JSON ファイル / InMemory リポジトリ、PriorityStrategy、固定値モニタ）
//! - **service**: TaskDataService（status による active / archive の振り分け）
//! - **app**: Scheduler と DeadlineReaper
//! - **config**: TOML 設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod service;

pub use app::{DeadlineReaper, Scheduler};
pub use config::AppConfig;
pub use domain::{Priority, Result, SchedulerError, Task, TaskId, TaskQuery, TaskStatus};
pub use service::TaskDataService;
