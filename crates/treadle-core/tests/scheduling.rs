//! End-to-end scheduling over JSON-backed repositories.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use treadle_core::config::{SchedulerConfig, TaskDataConfig};
use treadle_core::impls::{PriorityStrategy, StaticResourceMonitor};
use treadle_core::ports::FixedClock;
use treadle_core::{
    DeadlineReaper, Priority, Scheduler, SchedulerError, Task, TaskDataService, TaskQuery,
    TaskStatus,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

fn new_task(id: &str, priority: u8, offset_secs: i64) -> Task {
    Task::new(
        id,
        "agent-7",
        "mail.example.org",
        "inbox",
        format!("handle {id}"),
        Priority::new(priority).unwrap(),
        t0() + Duration::seconds(offset_secs),
    )
}

struct Harness {
    _dir: TempDir,
    config: TaskDataConfig,
    data: Arc<TaskDataService>,
    scheduler: Scheduler,
}

async fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let config = TaskDataConfig::default().with_base_dir(dir.path());
    let data = Arc::new(TaskDataService::open(&config).await.unwrap());
    let scheduler = Scheduler::new(
        Arc::new(StaticResourceMonitor::new(8192, 4.0)),
        Arc::new(PriorityStrategy::new(data.clone())),
        data.clone(),
        SchedulerConfig::default(),
    );
    Harness {
        _dir: dir,
        config,
        data,
        scheduler,
    }
}

async fn drain(scheduler: &Scheduler) -> Vec<String> {
    let mut ids = Vec::new();
    while let Some(task) = scheduler.get_next_task().await.unwrap() {
        assert_eq!(task.status, TaskStatus::Running);
        ids.push(task.task_id.to_string());
    }
    ids
}

#[tokio::test]
async fn dispatch_follows_priority_then_age() {
    let h = harness().await;
    h.scheduler.submit_task(new_task("low", 10, 0)).await.unwrap();
    h.scheduler.submit_task(new_task("urgent-late", 1, 20)).await.unwrap();
    h.scheduler.submit_task(new_task("urgent-early", 1, 10)).await.unwrap();

    assert_eq!(
        drain(&h.scheduler).await,
        vec!["urgent-early", "urgent-late", "low"]
    );
}

#[tokio::test]
async fn batch_is_capped_at_ten() {
    let h = harness().await;
    for i in 0..12 {
        h.scheduler
            .submit_task(new_task(&format!("t{i:02}"), 5, i))
            .await
            .unwrap();
    }

    let first = h.scheduler.get_next_task().await.unwrap().unwrap();
    assert_eq!(first.task_id.as_str(), "t00");
    assert_eq!(h.scheduler.queued_len().await, 9);

    let running = h
        .data
        .query_active_tasks(&TaskQuery::new().status(TaskStatus::Running).limit(50))
        .await
        .unwrap();
    assert_eq!(running.tasks.len(), 10);
}

#[tokio::test]
async fn dependent_waits_for_prerequisite_to_complete() {
    let h = harness().await;
    h.scheduler.submit_task(new_task("build", 5, 0)).await.unwrap();
    h.scheduler
        .submit_task(new_task("deploy", 1, 1).with_blocked_by(["build"]))
        .await
        .unwrap();

    let build = h.scheduler.get_next_task().await.unwrap().unwrap();
    assert_eq!(build.task_id.as_str(), "build");
    assert!(h.scheduler.get_next_task().await.unwrap().is_none());

    // A failed prerequisite still blocks.
    h.scheduler
        .update_task(build.with_status(TaskStatus::Failed))
        .await
        .unwrap();
    assert!(h.scheduler.get_next_task().await.unwrap().is_none());

    h.scheduler
        .update_task(build.with_status(TaskStatus::Completed))
        .await
        .unwrap();
    let deploy = h.scheduler.get_next_task().await.unwrap().unwrap();
    assert_eq!(deploy.task_id.as_str(), "deploy");
}

#[tokio::test]
async fn lifecycle_survives_reopen() {
    let h = harness().await;
    h.scheduler.submit_task(new_task("a", 5, 0)).await.unwrap();
    let running = h.scheduler.get_next_task().await.unwrap().unwrap();
    h.scheduler
        .update_task(
            running
                .with_checkpoint(serde_json::json!({"page": 3}))
                .with_status(TaskStatus::Completed),
        )
        .await
        .unwrap();

    let reopened = TaskDataService::open(&h.config).await.unwrap();
    assert!(reopened.active().get_by_id("a").await.unwrap().is_none());
    let stored = reopened.archive().get_by_id("a").await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Completed);
    assert_eq!(stored.checkpoint_data, Some(serde_json::json!({"page": 3})));
}

#[tokio::test]
async fn requeued_task_is_dispatched_again() {
    let h = harness().await;
    h.scheduler.submit_task(new_task("a", 5, 0)).await.unwrap();
    let running = h.scheduler.get_next_task().await.unwrap().unwrap();
    h.scheduler
        .update_task(running.with_status(TaskStatus::Failed))
        .await
        .unwrap();
    assert!(h.scheduler.get_next_task().await.unwrap().is_none());

    h.scheduler
        .update_task(running.with_status(TaskStatus::Pending))
        .await
        .unwrap();
    assert_eq!(h.scheduler.get_pending_tasks().await.unwrap().len(), 1);
    assert_eq!(drain(&h.scheduler).await, vec!["a"]);
    assert!(h.data.archive().get_by_id("a").await.unwrap().is_none());
}

#[tokio::test]
async fn ids_are_unique_across_tiers() {
    let h = harness().await;
    h.scheduler.submit_task(new_task("a", 5, 0)).await.unwrap();
    let err = h.scheduler.submit_task(new_task("a", 5, 1)).await.unwrap_err();
    assert!(matches!(err, SchedulerError::DuplicateKey(_)));

    h.scheduler
        .update_task(new_task("a", 5, 0).with_status(TaskStatus::Cancelled))
        .await
        .unwrap();
    let err = h.scheduler.submit_task(new_task("a", 5, 2)).await.unwrap_err();
    assert!(matches!(err, SchedulerError::DuplicateKey(_)));
}

#[tokio::test]
async fn paging_active_tasks_visits_each_once() {
    let h = harness().await;
    for i in 0..7 {
        h.scheduler
            .submit_task(new_task(&format!("p{i}"), 5, i))
            .await
            .unwrap();
    }

    let mut seen = Vec::new();
    let mut cursor = None;
    loop {
        let page = h
            .data
            .query_active_tasks(&TaskQuery::new().status(TaskStatus::New).limit(3).after(cursor))
            .await
            .unwrap();
        seen.extend(page.tasks.into_iter().map(|t| t.task_id.to_string()));
        match page.next_key {
            Some(key) => cursor = Some(key),
            None => break,
        }
    }
    assert_eq!(seen, vec!["p0", "p1", "p2", "p3", "p4", "p5", "p6"]);
}

#[tokio::test]
async fn reaper_fails_overdue_work_and_dependents_stay_blocked() {
    let h = harness().await;
    h.scheduler
        .submit_task(new_task("stuck", 5, 0).with_deadline(t0() + Duration::hours(1)))
        .await
        .unwrap();
    h.scheduler
        .submit_task(new_task("after", 5, 1).with_blocked_by(["stuck"]))
        .await
        .unwrap();
    let stuck = h.scheduler.get_next_task().await.unwrap().unwrap();
    assert_eq!(stuck.task_id.as_str(), "stuck");

    let clock = Arc::new(FixedClock::new(t0() + Duration::hours(2)));
    let reaper = DeadlineReaper::new(h.data.clone(), clock, 100);
    let reaped = reaper.sweep().await.unwrap();
    assert_eq!(reaped.len(), 1);
    assert_eq!(reaped[0].as_str(), "stuck");

    let stored = h.data.get_task_by_id("stuck").await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    // FAILED prerequisites keep blocking.
    assert!(h.scheduler.get_next_task().await.unwrap().is_none());
}
