use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use treadle_core::TaskStatus;

/// Submit, dispatch and inspect scheduled agent tasks.
#[derive(Parser, Debug)]
#[command(name = "treadle", version, about)]
pub struct CliArgs {
    /// Path to the TOML config file
    #[arg(long, env = "TREADLE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the task files (overrides tasks_data.data_base_dir)
    #[arg(long, env = "TREADLE_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// RAM the resource monitor reports as available
    #[arg(long, default_value_t = 8192, global = true)]
    pub ram_mb: u64,

    /// CPU cores the resource monitor reports as available
    #[arg(long, default_value_t = 4.0, global = true)]
    pub cpu_cores: f64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a NEW task and print its id
    Submit(SubmitArgs),
    /// Run one selection pass and print every task it claimed
    Next,
    /// Mark a task COMPLETED
    Complete { task_id: String },
    /// Mark a task FAILED
    Fail { task_id: String },
    /// Mark a task CANCELLED
    Cancel { task_id: String },
    /// Put a task back to PENDING, reviving it from the archive if needed
    Requeue { task_id: String },
    /// Print one task
    Show { task_id: String },
    /// Page through tasks
    List(ListArgs),
    /// Print PENDING tasks
    Pending,
    /// Fail live tasks whose deadline has passed
    Reap {
        /// Keep sweeping on the configured interval until Ctrl-C
        #[arg(long)]
        watch: bool,
    },
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    #[arg(long)]
    pub agent: String,
    #[arg(long)]
    pub domain: String,
    #[arg(long)]
    pub topic: String,
    #[arg(long)]
    pub message: String,
    /// 1 (highest) to 10 (lowest)
    #[arg(long, default_value_t = 5)]
    pub priority: u8,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub acceptance_criteria: Option<String>,
    /// Task ids that must finish first
    #[arg(long = "blocked-by")]
    pub blocked_by: Vec<String>,
    #[arg(long = "correlation")]
    pub correlation: Vec<String>,
    #[arg(long)]
    pub required_ram_mb: Option<u64>,
    #[arg(long)]
    pub required_cpu_cores: Option<f64>,
    /// Hours from now until the task is considered overdue
    #[arg(long)]
    pub deadline_hours: Option<i64>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long)]
    pub status: Option<TaskStatus>,
    /// Include archived tasks
    #[arg(long)]
    pub all: bool,
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
    /// Resume after this task id
    #[arg(long)]
    pub after: Option<String>,
    #[arg(long, default_value = "created_at")]
    pub sort: String,
    #[arg(long)]
    pub desc: bool,
}
