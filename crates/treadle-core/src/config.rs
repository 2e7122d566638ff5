//! Configuration types.
//!
//! Configuration is loaded once at startup into an `AppConfig` and the
//! relevant section is passed to each component's constructor.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{Result, SchedulerError};
use crate::impls::DEFAULT_MAX_BATCH;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tasks_data: TaskDataConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(SchedulerError::io(path, e)),
        };
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SchedulerError::Configuration(format!("invalid configuration: {e}")))
    }
}

/// Where the two task collections live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskDataConfig {
    /// Required; there is no implicit location.
    pub data_base_dir: Option<PathBuf>,
    pub active_repo_file: String,
    pub archive_repo_file: String,
}

impl Default for TaskDataConfig {
    fn default() -> Self {
        Self {
            data_base_dir: None,
            active_repo_file: "active_tasks.json".to_string(),
            archive_repo_file: "archive_tasks.json".to_string(),
        }
    }
}

impl TaskDataConfig {
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_base_dir = Some(dir.into());
        self
    }

    /// Resolve the active and archive file paths.
    pub fn repo_paths(&self) -> Result<(PathBuf, PathBuf)> {
        let base = self.data_base_dir.as_ref().ok_or_else(|| {
            SchedulerError::Configuration(
                "configuration key 'tasks_data.data_base_dir' is missing".to_string(),
            )
        })?;
        if self.active_repo_file == self.archive_repo_file {
            return Err(SchedulerError::Configuration(
                "active_repo_file and archive_repo_file must differ".to_string(),
            ));
        }
        Ok((
            base.join(&self.active_repo_file),
            base.join(&self.archive_repo_file),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Page size for each of the NEW and PENDING candidate queries.
    pub candidate_page_size: usize,
    /// Page size for the PENDING monitoring query.
    pub monitor_page_size: usize,
    /// Most tasks the strategy hands out per refill.
    pub max_batch: usize,
    pub reaper_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            candidate_page_size: 100,
            monitor_page_size: 1000,
            max_batch: DEFAULT_MAX_BATCH,
            reaper_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// File logging is enabled only when this is set.
    pub log_dir: Option<PathBuf>,
    pub log_file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            log_file_name: "treadle.log".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_document_gives_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.scheduler.candidate_page_size, 100);
        assert_eq!(config.scheduler.max_batch, 10);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [tasks_data]
            data_base_dir = "/var/lib/treadle"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.tasks_data.data_base_dir,
            Some(PathBuf::from("/var/lib/treadle"))
        );
        assert_eq!(config.tasks_data.archive_repo_file, "archive_tasks.json");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.log_file_name, "treadle.log");
    }

    #[test]
    fn malformed_document_is_configuration_error() {
        let err = AppConfig::from_toml_str("tasks_data = 3").unwrap_err();
        assert!(matches!(err, SchedulerError::Configuration(_)));
    }

    #[test]
    fn missing_base_dir_is_configuration_error() {
        let err = TaskDataConfig::default().repo_paths().unwrap_err();
        assert!(matches!(err, SchedulerError::Configuration(msg) if msg.contains("data_base_dir")));
    }

    #[test]
    fn repo_paths_join_base_dir() {
        let (active, archive) = TaskDataConfig::default()
            .with_base_dir("/data")
            .repo_paths()
            .unwrap();
        assert_eq!(active, PathBuf::from("/data/active_tasks.json"));
        assert_eq!(archive, PathBuf::from("/data/archive_tasks.json"));
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn load_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("treadle.toml");
        std::fs::write(&path, "[scheduler]\nmax_batch = 3\n").unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.scheduler.max_batch, 3);
    }
}
