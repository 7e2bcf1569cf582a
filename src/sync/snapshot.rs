//! Published task collection and the views the app derives from it.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::task::{Priority, Task};

/// Immutable view of the signed-in user's tasks.
///
/// Each publish replaces the whole snapshot, so a reader holding one never
/// observes a half-applied change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskSnapshot {
    /// Tasks in cache order (start time ascending, unscheduled last)
    pub tasks: Vec<Task>,
    /// Incremented on every publish
    pub version: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Criteria for [`TaskSnapshot::filtered`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub priority: Option<Priority>,
    pub completed: Option<bool>,
    /// Case-insensitive match against title and location
    pub query: Option<String>,
}

/// Orderings offered by the task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskSort {
    #[default]
    StartTime,
    /// High priority first, then by start time
    Priority,
    Title,
}

/// Counts shown on the overview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSummary {
    pub total: usize,
    pub completed: usize,
    pub outstanding: usize,
    pub high: usize,
    pub normal: usize,
    pub low: usize,
}

impl TaskSnapshot {
    pub(crate) fn succeed(&self, tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            version: self.version + 1,
            updated_at: Some(Utc::now()),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, remote_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.remote_id.as_deref() == Some(remote_id))
    }

    pub fn contains(&self, remote_id: &str) -> bool {
        self.get(remote_id).is_some()
    }

    pub fn filtered(&self, filter: &TaskFilter) -> Vec<Task> {
        let query = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()).map(str::to_lowercase);

        self.tasks
            .iter()
            .filter(|task| filter.priority.map_or(true, |priority| task.priority == priority))
            .filter(|task| filter.completed.map_or(true, |completed| task.completed == completed))
            .filter(|task| {
                query.as_deref().map_or(true, |q| {
                    task.title.to_lowercase().contains(q)
                        || task.location.as_deref().is_some_and(|loc| loc.to_lowercase().contains(q))
                })
            })
            .cloned()
            .collect()
    }

    pub fn sorted(&self, sort: TaskSort) -> Vec<Task> {
        let mut tasks = self.tasks.clone();
        match sort {
            TaskSort::StartTime => tasks.sort_by(Task::cache_order),
            TaskSort::Priority => {
                tasks.sort_by(|a, b| a.priority.rank().cmp(&b.priority.rank()).then_with(|| Task::cache_order(a, b)))
            }
            TaskSort::Title => tasks.sort_by(|a, b| compare_titles(&a.title, &b.title)),
        }
        tasks
    }

    pub fn outstanding(&self) -> Vec<Task> {
        self.tasks.iter().filter(|task| !task.completed).cloned().collect()
    }

    pub fn completed(&self) -> Vec<Task> {
        self.tasks.iter().filter(|task| task.completed).cloned().collect()
    }

    pub fn summary(&self) -> TaskSummary {
        self.tasks.iter().fold(TaskSummary::default(), |mut summary, task| {
            summary.total += 1;
            if task.completed {
                summary.completed += 1;
            } else {
                summary.outstanding += 1;
            }
            match task.priority {
                Priority::High => summary.high += 1,
                Priority::Normal => summary.normal += 1,
                Priority::Low => summary.low += 1,
            }
            summary
        })
    }
}

fn compare_titles(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

/// `tasks` with `task` inserted, replacing the entry with the same remote or
/// local id, kept in cache order.
pub(crate) fn with_task(tasks: &[Task], task: Task) -> Vec<Task> {
    let mut next: Vec<Task> = tasks.iter().filter(|existing| !same_task(existing, &task)).cloned().collect();
    next.push(task);
    next.sort_by(Task::cache_order);
    next
}

/// `tasks` without the entry carrying `remote_id`.
pub(crate) fn without_task(tasks: &[Task], remote_id: &str) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| task.remote_id.as_deref() != Some(remote_id))
        .cloned()
        .collect()
}

fn same_task(a: &Task, b: &Task) -> bool {
    match (&a.remote_id, &b.remote_id) {
        (Some(x), Some(y)) => x == y,
        _ => a.local_id.is_some() && a.local_id == b.local_id,
    }
}
