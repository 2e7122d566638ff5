//! ResourceMonitor port - 新しい仕事に使えるホストの容量
//!
//! 取得に失敗した場合、Scheduler は容量ゼロ（`ResourceSnapshot::zero()`）として扱います。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::Result;

/// Point-in-time capacity reading.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub available_ram_mb: u64,
    pub available_cpu_cores: f64,
}

impl ResourceSnapshot {
    /// The conservative reading used when the monitor cannot answer.
    pub fn zero() -> Self {
        Self::default()
    }
}

#[async_trait]
pub trait ResourceMonitor: Send + Sync {
    async fn available_ram_mb(&self) -> Result<u64>;

    async fn available_cpu_cores(&self) -> Result<f64>;

    async fn snapshot(&self) -> Result<ResourceSnapshot> {
        Ok(ResourceSnapshot {
            available_ram_mb: self.available_ram_mb().await?,
            available_cpu_cores: self.available_cpu_cores().await?,
        })
    }
}
