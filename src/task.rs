//! Task records and the raw input shapes used to create and edit them.
//!
//! A [`Task`] keeps `status` and `completed` private so the only way to
//! change either is through [`Task::set_status`] or
//! [`Task::toggle_completion`], which always write both.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{Error, Result};

pub const TASK_ID_PREFIX: &str = "task";
pub const TITLE_MAX_LEN: usize = 100;
pub const DESCRIPTION_MAX_LEN: usize = 500;
pub const CATEGORY_MAX_LEN: usize = 50;

const TASK_STATUSES: [&str; 3] = ["active", "completed", "archived"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Active,
    Completed,
    Archived,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Active => "active",
            TaskStatus::Completed => "completed",
            TaskStatus::Archived => "archived",
        }
    }

    /// Parse a status name, ignoring case and surrounding whitespace.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(TaskStatus::Active),
            "completed" => Some(TaskStatus::Completed),
            "archived" => Some(TaskStatus::Archived),
            _ => None,
        }
    }

    /// Parse a status or fail with a user-facing error.
    pub fn parse_arg(value: &str) -> Result<Self> {
        Self::parse(value).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "invalid status '{}' (expected {})",
                value.trim(),
                TASK_STATUSES.join("|")
            ))
        })
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }

    /// Sort rank: lower ranks come first.
    pub fn rank(self) -> u8 {
        match self {
            TaskPriority::High => 0,
            TaskPriority::Medium => 1,
            TaskPriority::Low => 2,
        }
    }

    /// Parse a priority name. Exact, case-sensitive match.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(TaskPriority::Low),
            "medium" => Some(TaskPriority::Medium),
            "high" => Some(TaskPriority::High),
            _ => None,
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    completed: bool,
}

impl Task {
    /// Build an active, not-completed task stamped at `now`.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        priority: TaskPriority,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            status: TaskStatus::Active,
            priority,
            due_date: None,
            category: None,
            created_at: now,
            updated_at: now,
            completed: false,
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Write `status` and keep `completed` in step with it.
    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.completed = status == TaskStatus::Completed;
    }

    /// Flip between active and completed. Archived tasks become completed.
    pub fn toggle_completion(&mut self) {
        if self.completed {
            self.set_status(TaskStatus::Active);
        } else {
            self.set_status(TaskStatus::Completed);
        }
    }

    /// Refresh `updated_at`, moving it strictly forward even if the clock
    /// has not advanced since the previous mutation. A stamp already at the
    /// end of the representable range stays where it is.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        } else if let Some(next) = self
            .updated_at
            .checked_add_signed(Duration::milliseconds(1))
        {
            self.updated_at = next;
        }
    }

    /// True when `completed` agrees with `status`.
    pub fn is_consistent(&self) -> bool {
        self.completed == (self.status == TaskStatus::Completed)
    }

    /// A task is overdue when its due date is before `today` and it is not
    /// completed.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        match self.due_date {
            Some(due) => !self.completed && due < today,
            None => false,
        }
    }

    /// Render the task back into form input, e.g. as the base for an edit.
    pub fn to_draft(&self) -> TaskDraft {
        TaskDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            priority: self.priority.as_str().to_string(),
            due_date: self.due_date.map(|date| date.format("%Y-%m-%d").to_string()),
            category: self.category.clone(),
        }
    }
}

/// Generate a new task id from a ULID: 48 bits of millisecond time followed
/// by 80 random bits.
pub fn generate_task_id() -> String {
    format!(
        "{}_{}",
        TASK_ID_PREFIX,
        Ulid::new().to_string().to_ascii_lowercase()
    )
}

/// Human form of a due date, e.g. `Apr 15, 2024`.
pub fn format_due_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

/// Raw form input for a task. Values are unparsed so validation can report
/// every problem instead of failing on the first unparseable field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub priority: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, priority: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            priority: priority.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_due_date(mut self, due_date: impl Into<String>) -> Self {
        self.due_date = Some(due_date.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Partial edit of an existing task.
///
/// Optional fields use `Some(None)` to clear the stored value and `None` to
/// leave it untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<String>,
    pub due_date: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub status: Option<TaskStatus>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.category.is_none()
            && self.status.is_none()
    }

    /// Overlay the patch onto `base`.
    pub fn merge_into(&self, mut base: TaskDraft) -> TaskDraft {
        if let Some(title) = &self.title {
            base.title = title.clone();
        }
        if let Some(description) = &self.description {
            base.description = description.clone();
        }
        if let Some(priority) = &self.priority {
            base.priority = priority.clone();
        }
        if let Some(due_date) = &self.due_date {
            base.due_date = due_date.clone();
        }
        if let Some(category) = &self.category {
            base.category = category.clone();
        }
        base
    }
}
