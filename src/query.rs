//! Filter and sort pipeline for deriving the visible task list.
//!
//! Both stages are pure and stable: they never reorder tasks that compare
//! equal, and never touch the input slice.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::task::{Task, TaskStatus};

/// Status criterion of a [`TaskFilter`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
    Archived,
}

impl StatusFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Active => "active",
            StatusFilter::Completed => "completed",
            StatusFilter::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "active" => Ok(StatusFilter::Active),
            "completed" => Ok(StatusFilter::Completed),
            "archived" => Ok(StatusFilter::Archived),
            other => Err(Error::InvalidArgument(format!(
                "invalid status filter '{other}' (expected all|active|completed|archived)"
            ))),
        }
    }

    pub fn matches(self, status: TaskStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => status == TaskStatus::Active,
            StatusFilter::Completed => status == TaskStatus::Completed,
            StatusFilter::Archived => status == TaskStatus::Archived,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilter {
    pub status: StatusFilter,
    pub search_query: String,
}

impl TaskFilter {
    pub fn new(status: StatusFilter, search_query: impl Into<String>) -> Self {
        Self {
            status,
            search_query: search_query.into(),
        }
    }

    pub fn with_status(status: StatusFilter) -> Self {
        Self::new(status, "")
    }

    /// True if `task` survives both filter stages.
    pub fn matches(&self, task: &Task) -> bool {
        if !self.status.matches(task.status()) {
            return false;
        }
        if self.search_query.trim().is_empty() {
            return true;
        }
        let query = self.search_query.to_lowercase();
        task.title.to_lowercase().contains(&query)
            || task
                .description
                .as_ref()
                .is_some_and(|description| description.to_lowercase().contains(&query))
    }
}

/// Partial filter change; unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterUpdate {
    pub status: Option<StatusFilter>,
    pub search_query: Option<String>,
}

impl FilterUpdate {
    pub fn apply(self, mut filter: TaskFilter) -> TaskFilter {
        if let Some(status) = self.status {
            filter.status = status;
        }
        if let Some(search_query) = self.search_query {
            filter.search_query = search_query;
        }
        filter
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    CreatedDate,
    Priority,
    DueDate,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::CreatedDate => "createdDate",
            SortKey::Priority => "priority",
            SortKey::DueDate => "dueDate",
        }
    }

    /// Accepts the stored camelCase names plus kebab/snake spellings.
    pub fn parse(value: &str) -> Result<Self> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|ch| *ch != '-' && *ch != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "createddate" | "created" => Ok(SortKey::CreatedDate),
            "priority" => Ok(SortKey::Priority),
            "duedate" | "due" => Ok(SortKey::DueDate),
            _ => Err(Error::InvalidArgument(format!(
                "invalid sort key '{}' (expected createdDate|priority|dueDate)",
                value.trim()
            ))),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keep tasks matching `filter`, preserving input order.
pub fn filter_tasks(tasks: &[Task], filter: &TaskFilter) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| filter.matches(task))
        .cloned()
        .collect()
}

/// Return a new ordering of `tasks` by `key`.
pub fn sort_tasks(tasks: &[Task], key: SortKey) -> Vec<Task> {
    let mut sorted = tasks.to_vec();
    // `sort_by` is stable; equal keys keep their filtered order.
    match key {
        SortKey::Priority => sorted.sort_by_key(|task| task.priority.rank()),
        SortKey::DueDate => sorted.sort_by(compare_due_dates),
        SortKey::CreatedDate => sorted.sort_by(|left, right| right.created_at.cmp(&left.created_at)),
    }
    sorted
}

/// The view shown to the user: filter first, then sort.
pub fn derive_view(tasks: &[Task], filter: &TaskFilter, key: SortKey) -> Vec<Task> {
    sort_tasks(&filter_tasks(tasks, filter), key)
}

fn compare_due_dates(left: &Task, right: &Task) -> Ordering {
    match (left.due_date, right.due_date) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
