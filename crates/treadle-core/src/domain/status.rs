//! TaskStatus - タスクの状態機械
//!
//! # 保存先
//! - NEW / PENDING / RUNNING は active リポジトリ
//! - COMPLETED / FAILED / CANCELLED は archive リポジトリ

use serde::{Deserialize, Serialize};
use std::fmt;

/// Task status.
///
/// State transitions:
/// - New -> Pending (accepted by the creator)
/// - New | Pending -> Running (selected by the scheduler)
/// - Running -> Completed | Failed | Cancelled (reported by the executor)
/// - any -> Pending (re-queue after checkpoint or retry, even from a terminal state)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Created, not yet accepted.
    New,

    /// Accepted and waiting to be scheduled.
    Pending,

    /// Selected by the scheduler and handed to an executor.
    Running,

    Completed,
    Failed,
    Cancelled,
}

/// Which repository a task lives in, derived from its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageTier {
    /// New, Pending, Running.
    Active,
    /// Completed, Failed, Cancelled.
    Archive,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::New,
        TaskStatus::Pending,
        TaskStatus::Running,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ];

    /// Is this a terminal state?
    ///
    /// Terminal tasks may still be re-queued to `Pending`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub fn tier(self) -> StorageTier {
        if self.is_terminal() {
            StorageTier::Archive
        } else {
            StorageTier::Active
        }
    }

    /// Does a prerequisite in this state keep its dependents from running?
    ///
    /// A failed prerequisite keeps blocking until it is re-queued and completes.
    /// Cancelled prerequisites release their dependents.
    pub fn is_blocking_dependency(self) -> bool {
        matches!(
            self,
            TaskStatus::New | TaskStatus::Pending | TaskStatus::Running | TaskStatus::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::New => "NEW",
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown task status: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TaskStatus::New, StorageTier::Active, true)]
    #[case(TaskStatus::Pending, StorageTier::Active, true)]
    #[case(TaskStatus::Running, StorageTier::Active, true)]
    #[case(TaskStatus::Completed, StorageTier::Archive, false)]
    #[case(TaskStatus::Failed, StorageTier::Archive, true)]
    #[case(TaskStatus::Cancelled, StorageTier::Archive, false)]
    fn classification(
        #[case] status: TaskStatus,
        #[case] tier: StorageTier,
        #[case] blocking: bool,
    ) {
        assert_eq!(status.tier(), tier);
        assert_eq!(status.is_blocking_dependency(), blocking);
        assert_eq!(status.is_terminal(), tier == StorageTier::Archive);
    }

    #[test]
    fn wire_format_is_screaming_case() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Cancelled).unwrap(),
            "\"CANCELLED\""
        );
        let parsed: TaskStatus = serde_json::from_str("\"PENDING\"").unwrap();
        assert_eq!(parsed, TaskStatus::Pending);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("running".parse::<TaskStatus>(), Ok(TaskStatus::Running));
        assert!("done".parse::<TaskStatus>().is_err());
    }
}
