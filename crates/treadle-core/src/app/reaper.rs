//! DeadlineReaper - 期限を過ぎた実行中タスクの回収
//!
//! Scheduler 自身は期限を見ません。選ばれないままのタスクや、
//! 払い出し後に実行側が放棄したタスクはこの sweep がないと active に残り続けます。
//!
//! # フロー
//! 1. NEW / PENDING / RUNNING を status ごとにページングして期限切れを集める
//! 2. 保存済みレコードで status と期限を再確認して FAILED へ遷移（archive へ移動）

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::{PageKey, Result, SchedulerError, TaskId, TaskQuery, TaskStatus};
use crate::ports::Clock;
use crate::service::TaskDataService;

const LIVE_STATUSES: [TaskStatus; 3] = [TaskStatus::New, TaskStatus::Pending, TaskStatus::Running];

pub struct DeadlineReaper {
    data_service: Arc<TaskDataService>,
    clock: Arc<dyn Clock>,
    page_size: usize,
}

impl DeadlineReaper {
    pub fn new(data_service: Arc<TaskDataService>, clock: Arc<dyn Clock>, page_size: usize) -> Self {
        Self {
            data_service,
            clock,
            page_size: page_size.max(1),
        }
    }

    /// Mark every live task past its deadline as FAILED. Returns the ids
    /// that were failed by this call.
    pub async fn sweep(&self) -> Result<Vec<TaskId>> {
        let now = self.clock.now();
        let mut reaped = Vec::new();

        for status in LIVE_STATUSES {
            // Collect first: failing a task moves it out of the active
            // repository, which would shift the pages under the cursor.
            let mut expired = Vec::new();
            let mut cursor: Option<PageKey> = None;
            loop {
                let query = TaskQuery::new()
                    .status(status)
                    .limit(self.page_size)
                    .after(cursor.take());
                let page = self.data_service.query_active_tasks(&query).await?;
                expired.extend(page.tasks.into_iter().filter(|t| t.is_past_deadline(now)));
                match page.next_key {
                    Some(key) => cursor = Some(key),
                    None => break,
                }
            }

            for task in expired {
                // Re-checked on the stored record: the deadline may have been
                // extended, or an executor may have checkpointed, since the scan.
                match self
                    .data_service
                    .transition_status_if(task.task_id.as_str(), &[status], TaskStatus::Failed, |t| {
                        t.is_past_deadline(now)
                    })
                    .await
                {
                    Ok(Some(failed)) => {
                        tracing::info!(task_id = %failed.task_id, deadline = %failed.deadline, was = %status, "deadline passed, task failed");
                        reaped.push(failed.task_id);
                    }
                    Ok(None) => {
                        tracing::debug!(task_id = %task.task_id, "deadline moved before reaping");
                    }
                    Err(e @ (SchedulerError::StatusConflict { .. } | SchedulerError::NotFound(_))) => {
                        tracing::debug!(task_id = %task.task_id, error = %e, "task moved before reaping");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(reaped)
    }

    /// Sweep every `interval` until `shutdown` flips to true or its sender
    /// is dropped. A failed sweep is logged and retried on the next tick.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            match self.sweep().await {
                Ok(reaped) if !reaped.is_empty() => {
                    tracing::info!(count = reaped.len(), "reaped expired tasks");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "deadline sweep failed"),
            }
        }
        tracing::debug!("deadline reaper stopped");
    }

    /// Run on a background task.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> ReaperHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move { self.run(interval, shutdown_rx).await });
        ReaperHandle { shutdown_tx, join }
    }
}

/// Handle to a spawned reaper. Dropping it also stops the loop.
pub struct ReaperHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl ReaperHandle {
    pub async fn shutdown_and_join(self) {
        // receiver may already be gone
        let _ = self.shutdown_tx.send(true);
        let _ = self.join.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::fixtures::{t0, task};
    use crate::impls::InMemoryTaskRepository;
    use crate::ports::FixedClock;
    use chrono::Duration as ChronoDuration;

    fn data_service() -> Arc<TaskDataService> {
        Arc::new(TaskDataService::new(
            Arc::new(InMemoryTaskRepository::new()),
            Arc::new(InMemoryTaskRepository::new()),
        ))
    }

    #[tokio::test]
    async fn sweep_fails_only_expired_live_tasks() {
        let data = data_service();
        let clock = Arc::new(FixedClock::new(t0()));
        let soon = t0() + ChronoDuration::hours(1);
        let later = t0() + ChronoDuration::days(3);

        data.add_task(task("new-late", 5, 0).with_deadline(soon)).await.unwrap();
        data.add_task(task("new-ok", 5, 1).with_deadline(later)).await.unwrap();
        data.add_task(task("run-late", 5, 2).with_deadline(soon)).await.unwrap();
        data.update_task(
            task("run-late", 5, 2)
                .with_deadline(soon)
                .with_status(TaskStatus::Running),
        )
        .await
        .unwrap();
        data.update_task(
            task("done-late", 5, 3)
                .with_deadline(soon)
                .with_status(TaskStatus::Completed),
        )
        .await
        .unwrap();

        let reaper = DeadlineReaper::new(data.clone(), clock.clone(), 1);
        assert!(reaper.sweep().await.unwrap().is_empty());

        clock.advance(ChronoDuration::hours(2));
        let mut reaped: Vec<String> = reaper
            .sweep()
            .await
            .unwrap()
            .into_iter()
            .map(TaskId::into_string)
            .collect();
        reaped.sort();
        assert_eq!(reaped, vec!["new-late", "run-late"]);

        for id in ["new-late", "run-late"] {
            assert!(data.active().get_by_id(id).await.unwrap().is_none());
            let archived = data.archive().get_by_id(id).await.unwrap().unwrap();
            assert_eq!(archived.status, TaskStatus::Failed);
        }
        let done = data.get_task_by_id("done-late").await.unwrap().unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(data.active().get_by_id("new-ok").await.unwrap().is_some());

        assert!(reaper.sweep().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reaped_record_keeps_executor_checkpoint() {
        let data = data_service();
        let clock = Arc::new(FixedClock::new(t0() + ChronoDuration::days(30)));
        data.add_task(task("a", 5, 0)).await.unwrap();
        let running = data
            .transition_status("a", &[TaskStatus::New], TaskStatus::Running)
            .await
            .unwrap();
        data.update_task(running.with_checkpoint(serde_json::json!({"step": 4})))
            .await
            .unwrap();

        let reaper = DeadlineReaper::new(data.clone(), clock, 10);
        assert_eq!(reaper.sweep().await.unwrap().len(), 1);

        let archived = data.archive().get_by_id("a").await.unwrap().unwrap();
        assert_eq!(archived.status, TaskStatus::Failed);
        assert_eq!(archived.checkpoint_data, Some(serde_json::json!({"step": 4})));
    }

    #[tokio::test]
    async fn spawned_reaper_stops_on_shutdown() {
        let data = data_service();
        let clock = Arc::new(FixedClock::new(t0() + ChronoDuration::days(30)));
        data.add_task(task("a", 5, 0)).await.unwrap();

        let reaper = Arc::new(DeadlineReaper::new(data.clone(), clock, 10));
        let handle = reaper.spawn(Duration::from_millis(10));

        let mut failed = false;
        for _ in 0..100 {
            if data.archive().get_by_id("a").await.unwrap().is_some() {
                failed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.shutdown_and_join().await;
        assert!(failed, "reaper loop never failed the expired task");
    }
}
