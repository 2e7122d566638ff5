//! Service - ports を組み合わせたサービス層
//!
//! - **TaskDataService**: active / archive を 1 つの論理ストアとして扱う

pub mod data_service;

pub use self::data_service::TaskDataService;
