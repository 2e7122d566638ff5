//! The task record.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{Result, SchedulerError, TaskId, TaskStatus};

/// Deadline assigned to tasks that do not set one explicitly.
pub const DEFAULT_DEADLINE_DAYS: i64 = 7;
pub const DEFAULT_REQUIRED_RAM_MB: u64 = 4096;
pub const DEFAULT_REQUIRED_CPU_CORES: f64 = 0.5;
pub const MIN_REQUIRED_CPU_CORES: f64 = 0.01;

/// Task priority in `[1, 10]`; 1 is the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const HIGHEST: Priority = Priority(1);
    pub const LOWEST: Priority = Priority(10);

    pub fn new(value: u8) -> std::result::Result<Self, String> {
        if (Self::HIGHEST.0..=Self::LOWEST.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(format!("priority must be within 1..=10, got {value}"))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Priority::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A discrete unit of work for an agent.
///
/// Treat a `Task` as a value: to change it, build an updated copy with one of
/// the `with_*` methods and hand the copy to `update_task`. Provenance fields
/// and `created_at` are never changed after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    #[serde(default)]
    pub task_description: String,
    #[serde(default)]
    pub task_acceptance_criteria: String,
    #[serde(default)]
    pub requires_human_acceptance: bool,
    pub deadline: DateTime<Utc>,

    pub agent_id: String,
    pub source_domain: String,
    pub source_topic: String,
    pub input_message: String,

    pub priority: Priority,
    /// Prerequisites that must finish before this task may run.
    #[serde(default)]
    pub blocked_by: BTreeSet<TaskId>,
    /// Tasks waiting on this one. Kept consistent by producers; the
    /// scheduler never reads it.
    #[serde(default)]
    pub blocking: BTreeSet<TaskId>,
    #[serde(default)]
    pub correlation_ids: BTreeSet<String>,

    pub required_ram_mb: u64,
    pub required_cpu_cores: f64,

    pub status: TaskStatus,
    #[serde(default)]
    pub duration_estimate_sec: Option<f64>,
    pub created_at: DateTime<Utc>,

    /// Pause/resume state, owned by the executing agent.
    #[serde(default)]
    pub checkpoint_data: Option<serde_json::Value>,
    /// Post-execution telemetry, owned by the executing agent.
    #[serde(default)]
    pub execution_metrics: Option<serde_json::Value>,
}

impl Task {
    /// Create a NEW task with default resource estimates and deadline.
    pub fn new(
        task_id: impl Into<TaskId>,
        agent_id: impl Into<String>,
        source_domain: impl Into<String>,
        source_topic: impl Into<String>,
        input_message: impl Into<String>,
        priority: Priority,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            task_description: String::new(),
            task_acceptance_criteria: String::new(),
            requires_human_acceptance: false,
            deadline: created_at + Duration::days(DEFAULT_DEADLINE_DAYS),
            agent_id: agent_id.into(),
            source_domain: source_domain.into(),
            source_topic: source_topic.into(),
            input_message: input_message.into(),
            priority,
            blocked_by: BTreeSet::new(),
            blocking: BTreeSet::new(),
            correlation_ids: BTreeSet::new(),
            required_ram_mb: DEFAULT_REQUIRED_RAM_MB,
            required_cpu_cores: DEFAULT_REQUIRED_CPU_CORES,
            status: TaskStatus::New,
            duration_estimate_sec: None,
            created_at,
            checkpoint_data: None,
            execution_metrics: None,
        }
    }

    pub fn with_status(&self, status: TaskStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(
        mut self,
        description: impl Into<String>,
        acceptance_criteria: impl Into<String>,
    ) -> Self {
        self.task_description = description.into();
        self.task_acceptance_criteria = acceptance_criteria.into();
        self
    }

    pub fn with_human_acceptance(mut self, required: bool) -> Self {
        self.requires_human_acceptance = required;
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_blocked_by<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskId>,
    {
        self.blocked_by = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_blocking<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskId>,
    {
        self.blocking = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_correlation_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.correlation_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_resources(mut self, ram_mb: u64, cpu_cores: f64) -> Self {
        self.required_ram_mb = ram_mb;
        self.required_cpu_cores = cpu_cores;
        self
    }

    pub fn with_duration_estimate(mut self, seconds: f64) -> Self {
        self.duration_estimate_sec = Some(seconds);
        self
    }

    pub fn with_checkpoint(&self, checkpoint: serde_json::Value) -> Self {
        Self {
            checkpoint_data: Some(checkpoint),
            ..self.clone()
        }
    }

    pub fn with_execution_metrics(&self, metrics: serde_json::Value) -> Self {
        Self {
            execution_metrics: Some(metrics),
            ..self.clone()
        }
    }

    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.deadline < now
    }

    /// Check the numeric constraints the type system does not enforce.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| SchedulerError::InvalidTask {
            task_id: self.task_id.clone(),
            reason,
        };

        if self.task_id.as_str().is_empty() {
            return Err(invalid("task_id must not be empty".to_string()));
        }
        if self.required_ram_mb < 1 {
            return Err(invalid("required_ram_mb must be at least 1".to_string()));
        }
        if !self.required_cpu_cores.is_finite()
            || self.required_cpu_cores < MIN_REQUIRED_CPU_CORES
        {
            return Err(invalid(format!(
                "required_cpu_cores must be at least {MIN_REQUIRED_CPU_CORES}, got {}",
                self.required_cpu_cores
            )));
        }
        if let Some(estimate) = self.duration_estimate_sec
            && !(estimate.is_finite() && estimate >= 0.0)
        {
            return Err(invalid(format!(
                "duration_estimate_sec must be non-negative, got {estimate}"
            )));
        }
        Ok(())
    }
}
