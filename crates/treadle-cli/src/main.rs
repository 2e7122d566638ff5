mod cli;
mod logging;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use treadle_core::app::DeadlineReaper;
use treadle_core::domain::PageKey;
use treadle_core::impls::{PriorityStrategy, StaticResourceMonitor};
use treadle_core::ports::{SystemClock, TaskIdGenerator, UlidTaskIdGenerator};
use treadle_core::{
    AppConfig, Priority, Scheduler, Task, TaskDataService, TaskQuery, TaskStatus,
};

use crate::cli::{CliArgs, Command, ListArgs, SubmitArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AppConfig::default(),
    };
    if let Some(dir) = &args.data_dir {
        config.tasks_data.data_base_dir = Some(dir.clone());
    }

    let _log_guard = logging::init(&config.logging);

    let data = Arc::new(
        TaskDataService::open(&config.tasks_data)
            .await
            .context("failed to open task store")?,
    );
    let scheduler = Scheduler::new(
        Arc::new(StaticResourceMonitor::new(args.ram_mb, args.cpu_cores)),
        Arc::new(PriorityStrategy::with_max_batch(
            data.clone(),
            config.scheduler.max_batch,
        )),
        data.clone(),
        config.scheduler.clone(),
    );

    match args.command {
        Command::Submit(submit) => {
            let task = build_task(submit)?;
            let task_id = task.task_id.clone();
            scheduler.submit_task(task).await?;
            println!("{task_id}");
        }
        Command::Next => {
            // The claim cache lives only as long as this process, so print
            // the whole refilled batch: every one of them is RUNNING now.
            let mut claimed = Vec::new();
            if let Some(first) = scheduler.get_next_task().await? {
                claimed.push(first);
                while scheduler.queued_len().await > 0 {
                    if let Some(task) = scheduler.get_next_task().await? {
                        claimed.push(task);
                    }
                }
            }
            if claimed.is_empty() {
                eprintln!("no runnable task");
            }
            println!("{}", serde_json::to_string_pretty(&claimed)?);
        }
        Command::Complete { task_id } => {
            transition(&scheduler, &data, &task_id, TaskStatus::Completed).await?
        }
        Command::Fail { task_id } => {
            transition(&scheduler, &data, &task_id, TaskStatus::Failed).await?
        }
        Command::Cancel { task_id } => {
            transition(&scheduler, &data, &task_id, TaskStatus::Cancelled).await?
        }
        Command::Requeue { task_id } => {
            transition(&scheduler, &data, &task_id, TaskStatus::Pending).await?
        }
        Command::Show { task_id } => {
            let task = find(&data, &task_id).await?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        Command::List(list) => list_tasks(&data, list).await?,
        Command::Pending => {
            let pending = scheduler.get_pending_tasks().await?;
            println!("{}", serde_json::to_string_pretty(&pending)?);
        }
        Command::Reap { watch } => {
            let reaper = Arc::new(DeadlineReaper::new(
                data.clone(),
                Arc::new(SystemClock),
                config.scheduler.monitor_page_size,
            ));
            if watch {
                let interval = Duration::from_secs(config.scheduler.reaper_interval_secs.max(1));
                tracing::info!(interval_secs = interval.as_secs(), "deadline reaper running");
                let handle = reaper.spawn(interval);
                tokio::signal::ctrl_c()
                    .await
                    .context("failed to listen for Ctrl-C")?;
                handle.shutdown_and_join().await;
            } else {
                for task_id in reaper.sweep().await? {
                    println!("{task_id}");
                }
            }
        }
    }
    Ok(())
}

fn build_task(args: SubmitArgs) -> Result<Task> {
    let ids = UlidTaskIdGenerator::new(SystemClock);
    let priority = Priority::new(args.priority).map_err(|e| anyhow!(e))?;
    let now = chrono::Utc::now();

    let mut task = Task::new(
        ids.generate_task_id(),
        args.agent,
        args.domain,
        args.topic,
        args.message,
        priority,
        now,
    )
    .with_blocked_by(args.blocked_by)
    .with_correlation_ids(args.correlation);

    if args.description.is_some() || args.acceptance_criteria.is_some() {
        task = task.with_description(
            args.description.unwrap_or_default(),
            args.acceptance_criteria.unwrap_or_default(),
        );
    }
    if args.required_ram_mb.is_some() || args.required_cpu_cores.is_some() {
        let ram = args.required_ram_mb.unwrap_or(task.required_ram_mb);
        let cpu = args.required_cpu_cores.unwrap_or(task.required_cpu_cores);
        task = task.with_resources(ram, cpu);
    }
    if let Some(hours) = args.deadline_hours {
        task = task.with_deadline(now + chrono::Duration::hours(hours));
    }
    Ok(task)
}

async fn find(data: &TaskDataService, task_id: &str) -> Result<Task> {
    data.get_task_by_id(task_id)
        .await?
        .ok_or_else(|| anyhow!("task {task_id} not found"))
}

async fn transition(
    scheduler: &Scheduler,
    data: &TaskDataService,
    task_id: &str,
    status: TaskStatus,
) -> Result<()> {
    let task = find(data, task_id).await?;
    if task.status == status {
        bail!("task {task_id} is already {status}");
    }
    let from = task.status;
    scheduler.update_task(task.with_status(status)).await?;
    tracing::info!(task_id, %from, to = %status, "task updated");
    Ok(())
}

async fn list_tasks(data: &TaskDataService, args: ListArgs) -> Result<()> {
    let mut query = TaskQuery::new()
        .limit(args.limit)
        .sort_by(args.sort, !args.desc)
        .after(args.after.map(PageKey::new));
    if let Some(status) = args.status {
        query = query.status(status);
    }

    let page = if args.all {
        data.query_all_tasks(&query).await?
    } else {
        data.query_active_tasks(&query).await?
    };
    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}
