//! Form input validation.
//!
//! Every rule is checked independently and all failures are reported
//! together, keyed by the field name the form uses.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate};

use crate::task::{
    TaskDraft, TaskPriority, CATEGORY_MAX_LEN, DESCRIPTION_MAX_LEN, TITLE_MAX_LEN,
};

pub const FIELD_TITLE: &str = "title";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_PRIORITY: &str = "priority";
pub const FIELD_DUE_DATE: &str = "dueDate";
pub const FIELD_CATEGORY: &str = "category";

/// Outcome of validating a [`TaskDraft`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    errors: BTreeMap<&'static str, String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &BTreeMap<&'static str, String> {
        &self.errors
    }

    /// Message recorded for `field`, if it failed.
    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    fn push(&mut self, field: &'static str, message: &str) {
        self.errors.insert(field, message.to_string());
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// A draft that passed validation, with values parsed and normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub category: Option<String>,
}

/// Check a draft against the form rules.
pub fn validate_task_form(draft: &TaskDraft) -> ValidationReport {
    let mut report = ValidationReport::default();

    let title = draft.title.trim();
    if title.is_empty() {
        report.push(FIELD_TITLE, "Title is required");
    } else if title.chars().count() > TITLE_MAX_LEN {
        report.push(FIELD_TITLE, "Title must be less than 100 characters");
    }

    if let Some(description) = present(&draft.description) {
        if description.chars().count() > DESCRIPTION_MAX_LEN {
            report.push(
                FIELD_DESCRIPTION,
                "Description must be less than 500 characters",
            );
        }
    }

    if TaskPriority::parse(&draft.priority).is_none() {
        report.push(FIELD_PRIORITY, "Invalid priority");
    }

    if let Some(due_date) = present(&draft.due_date) {
        if parse_due_date(due_date).is_none() {
            report.push(FIELD_DUE_DATE, "Invalid date format");
        }
    }

    if let Some(category) = present(&draft.category) {
        if category.chars().count() > CATEGORY_MAX_LEN {
            report.push(FIELD_CATEGORY, "Category must be less than 50 characters");
        }
    }

    report
}

/// Validate and normalize a draft in one step.
///
/// Titles are trimmed and blank optional fields become absent.
pub fn parse_draft(draft: &TaskDraft) -> Result<ValidDraft, ValidationReport> {
    let report = validate_task_form(draft);
    if !report.is_valid() {
        return Err(report);
    }

    let Some(priority) = TaskPriority::parse(&draft.priority) else {
        return Err(report);
    };

    Ok(ValidDraft {
        title: draft.title.trim().to_string(),
        description: present(&draft.description).map(str::to_string),
        priority,
        due_date: present(&draft.due_date).and_then(parse_due_date),
        category: present(&draft.category).map(str::to_string),
    })
}

/// Parse a calendar date given as `YYYY-MM-DD` or as an RFC 3339 timestamp.
pub fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|timestamp| timestamp.date_naive())
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|text| !text.trim().is_empty())
}
