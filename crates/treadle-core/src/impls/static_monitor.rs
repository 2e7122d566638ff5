//! Resource monitor reporting a fixed capacity.
//!
//! Sampling real host telemetry is left to other implementations of
//! `ResourceMonitor`; this one is what the CLI and tests plug in.

use async_trait::async_trait;

use crate::domain::Result;
use crate::ports::{ResourceMonitor, ResourceSnapshot};

#[derive(Debug, Clone, Copy)]
pub struct StaticResourceMonitor {
    snapshot: ResourceSnapshot,
}

impl StaticResourceMonitor {
    pub fn new(available_ram_mb: u64, available_cpu_cores: f64) -> Self {
        Self {
            snapshot: ResourceSnapshot {
                available_ram_mb,
                available_cpu_cores,
            },
        }
    }
}

#[async_trait]
impl ResourceMonitor for StaticResourceMonitor {
    async fn available_ram_mb(&self) -> Result<u64> {
        Ok(self.snapshot.available_ram_mb)
    }

    async fn available_cpu_cores(&self) -> Result<f64> {
        Ok(self.snapshot.available_cpu_cores)
    }
}
