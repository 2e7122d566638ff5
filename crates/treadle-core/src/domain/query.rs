//! Filter / sort / keyset-paginate over a task collection.
//!
//! Both repository implementations hand their full collection to
//! [`run_query`], so paging behaves identically regardless of storage.
//!
//! Paging contract:
//! - the cursor is the last task id of the previous page
//! - it is resolved by position in the freshly sorted, filtered list
//! - an unknown cursor restarts from the first row
//! - ordering is total (ties broken by task id), so a fixed input set always
//!   pages the same way; concurrent writes between pages may still skip or
//!   repeat rows

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::{Task, TaskId, TaskStatus};

pub const DEFAULT_SORT_FIELD: &str = "created_at";
pub const DEFAULT_QUERY_LIMIT: usize = 10;

/// Keyset cursor: the last id of the page that was just returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageKey {
    pub last_id: TaskId,
}

impl PageKey {
    pub fn new(last_id: impl Into<TaskId>) -> Self {
        Self {
            last_id: last_id.into(),
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    /// Present exactly when more rows exist after this page.
    pub next_key: Option<PageKey>,
}

impl TaskPage {
    pub fn ids(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.task_id.as_str()).collect()
    }
}

/// Task attributes a query can sort by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    TaskId,
    AgentId,
    SourceDomain,
    SourceTopic,
    InputMessage,
    TaskDescription,
    TaskAcceptanceCriteria,
    RequiresHumanAcceptance,
    Priority,
    Status,
    CreatedAt,
    Deadline,
    RequiredRamMb,
    RequiredCpuCores,
    DurationEstimateSec,
}

impl SortField {
    /// Resolve a field name. Unknown names fall back to `created_at`
    /// instead of failing.
    pub fn resolve(name: &str) -> SortField {
        match name {
            "task_id" => SortField::TaskId,
            "agent_id" => SortField::AgentId,
            "source_domain" => SortField::SourceDomain,
            "source_topic" => SortField::SourceTopic,
            "input_message" => SortField::InputMessage,
            "task_description" => SortField::TaskDescription,
            "task_acceptance_criteria" => SortField::TaskAcceptanceCriteria,
            "requires_human_acceptance" => SortField::RequiresHumanAcceptance,
            "priority" => SortField::Priority,
            "status" => SortField::Status,
            "created_at" => SortField::CreatedAt,
            "deadline" => SortField::Deadline,
            "required_ram_mb" => SortField::RequiredRamMb,
            "required_cpu_cores" => SortField::RequiredCpuCores,
            "duration_estimate_sec" => SortField::DurationEstimateSec,
            other => {
                tracing::debug!(sort_field = other, "unknown sort field, using created_at");
                SortField::CreatedAt
            }
        }
    }

    fn compare(self, a: &Task, b: &Task) -> Ordering {
        match self {
            SortField::TaskId => a.task_id.cmp(&b.task_id),
            SortField::AgentId => a.agent_id.cmp(&b.agent_id),
            SortField::SourceDomain => a.source_domain.cmp(&b.source_domain),
            SortField::SourceTopic => a.source_topic.cmp(&b.source_topic),
            SortField::InputMessage => a.input_message.cmp(&b.input_message),
            SortField::TaskDescription => a.task_description.cmp(&b.task_description),
            SortField::TaskAcceptanceCriteria => a
                .task_acceptance_criteria
                .cmp(&b.task_acceptance_criteria),
            SortField::RequiresHumanAcceptance => a
                .requires_human_acceptance
                .cmp(&b.requires_human_acceptance),
            SortField::Priority => a.priority.cmp(&b.priority),
            SortField::Status => a.status.cmp(&b.status),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::Deadline => a.deadline.cmp(&b.deadline),
            SortField::RequiredRamMb => a.required_ram_mb.cmp(&b.required_ram_mb),
            SortField::RequiredCpuCores => a.required_cpu_cores.total_cmp(&b.required_cpu_cores),
            // None sorts first.
            SortField::DurationEstimateSec => {
                match (a.duration_estimate_sec, b.duration_estimate_sec) {
                    (Some(x), Some(y)) => x.total_cmp(&y),
                    (x, y) => x.is_some().cmp(&y.is_some()),
                }
            }
        }
    }
}

/// Query parameters. All supplied filters must match.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub agent_id: Option<String>,
    /// Matches tasks whose correlation set contains this id.
    pub correlation_id: Option<String>,
    pub sort_field: String,
    pub sort_ascending: bool,
    pub limit: usize,
    pub exclusive_start_key: Option<PageKey>,
}

impl Default for TaskQuery {
    fn default() -> Self {
        Self {
            status: None,
            agent_id: None,
            correlation_id: None,
            sort_field: DEFAULT_SORT_FIELD.to_string(),
            sort_ascending: true,
            limit: DEFAULT_QUERY_LIMIT,
            exclusive_start_key: None,
        }
    }
}

impl TaskQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, ascending: bool) -> Self {
        self.sort_field = field.into();
        self.sort_ascending = ascending;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn after(mut self, key: Option<PageKey>) -> Self {
        self.exclusive_start_key = key;
        self
    }

    /// Empty agent or correlation strings count as no filter.
    pub fn matches(&self, task: &Task) -> bool {
        self.status.is_none_or(|s| task.status == s)
            && non_empty(&self.agent_id).is_none_or(|a| task.agent_id == a)
            && non_empty(&self.correlation_id).is_none_or(|c| task.correlation_ids.contains(c))
    }
}

fn non_empty(filter: &Option<String>) -> Option<&str> {
    filter.as_deref().filter(|s| !s.is_empty())
}

/// Run `query` over a snapshot of a collection.
pub fn run_query<'a, I>(tasks: I, query: &TaskQuery) -> TaskPage
where
    I: IntoIterator<Item = &'a Task>,
{
    let field = SortField::resolve(&query.sort_field);
    let mut results: Vec<&Task> = tasks.into_iter().filter(|t| query.matches(t)).collect();

    results.sort_by(|a, b| {
        let primary = field.compare(a, b);
        let primary = if query.sort_ascending {
            primary
        } else {
            primary.reverse()
        };
        primary.then_with(|| a.task_id.cmp(&b.task_id))
    });

    let start = query
        .exclusive_start_key
        .as_ref()
        .and_then(|key| results.iter().position(|t| t.task_id == key.last_id))
        .map_or(0, |pos| pos + 1);

    let end = start.saturating_add(query.limit).min(results.len());
    let page: Vec<Task> = results[start.min(end)..end]
        .iter()
        .map(|t| (*t).clone())
        .collect();

    let next_key = match page.last() {
        Some(last) if end < results.len() => Some(PageKey::new(last.task_id.clone())),
        _ => None,
    };

    TaskPage {
        tasks: page,
        next_key,
    }
}
