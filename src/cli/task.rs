//! Task command implementations.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use chrono::NaiveDate;
use mockable::{Clock, DefaultClock};
use serde::Serialize;
use tracing::warn;

use crate::config::{resolve_data_dir, Config};
use crate::error::{Error, Result};
use crate::events::EventDestination;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::query::{FilterUpdate, SortKey, StatusFilter, TaskFilter};
use crate::storage::{FileStorage, TaskRepository};
use crate::store::{LoadOutcome, TaskStore};
use crate::task::{format_due_date, Task, TaskDraft, TaskPatch, TaskStatus};

/// Global flags shared by every command.
#[derive(Debug, Clone)]
pub struct CommonOptions {
    pub data_dir: Option<PathBuf>,
    pub events: Option<String>,
    pub json: bool,
    pub quiet: bool,
}

impl CommonOptions {
    pub(super) fn load_config(&self) -> Result<(PathBuf, Config)> {
        let data_dir = resolve_data_dir(self.data_dir.as_deref())?;
        let config = Config::load_from_dir(&data_dir)?;
        Ok((data_dir, config))
    }
}

pub struct AddOptions {
    pub title: String,
    pub description: Option<String>,
    pub priority: String,
    pub due: Option<String>,
    pub category: Option<String>,
    pub common: CommonOptions,
}

pub struct EditOptions {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<String>,
    pub due: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub status: Option<String>,
    pub common: CommonOptions,
}

pub struct IdOptions {
    pub id: String,
    pub common: CommonOptions,
}

pub struct ListOptions {
    pub status: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub common: CommonOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Complete,
    Archive,
    Delete,
}

impl BulkAction {
    fn header(self) -> &'static str {
        match self {
            BulkAction::Complete => "Tasks completed",
            BulkAction::Archive => "Tasks archived",
            BulkAction::Delete => "Tasks deleted",
        }
    }

    fn command(self) -> &'static str {
        match self {
            BulkAction::Complete => "bulk complete",
            BulkAction::Archive => "bulk archive",
            BulkAction::Delete => "bulk delete",
        }
    }
}

pub struct BulkOptions {
    pub action: BulkAction,
    pub ids: Vec<String>,
    pub common: CommonOptions,
}

#[derive(Serialize)]
struct TaskView<'a> {
    #[serde(flatten)]
    task: &'a Task,
    overdue: bool,
}

impl<'a> TaskView<'a> {
    fn new(task: &'a Task, today: NaiveDate) -> Self {
        Self {
            task,
            overdue: task.is_overdue(today),
        }
    }
}

#[derive(Serialize)]
struct TaskListOutput<'a> {
    filter: &'a TaskFilter,
    sort_by: SortKey,
    total: usize,
    visible: usize,
    tasks: Vec<TaskView<'a>>,
}

#[derive(Serialize)]
struct BulkOutput {
    action: BulkAction,
    requested: usize,
    affected: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unknown: Vec<String>,
}

enum Access {
    Read,
    Write,
}

struct TaskContext {
    store: TaskStore,
    warnings: Rc<RefCell<Vec<String>>>,
    events_to_stdout: bool,
}

impl TaskContext {
    fn output_options(&self, common: &CommonOptions) -> OutputOptions {
        OutputOptions {
            json: common.json && !self.events_to_stdout,
            quiet: common.quiet || self.events_to_stdout,
        }
    }

    /// Turn a failed automatic save into a command failure.
    fn ensure_saved(&self) -> Result<()> {
        match self.store.last_save_error() {
            Some(message) => Err(Error::OperationFailed(format!(
                "change was not saved: {message}"
            ))),
            None => Ok(()),
        }
    }

    fn drain_warnings(&self, human: &mut HumanOutput) {
        for warning in self.warnings.borrow_mut().drain(..) {
            human.push_warning(warning);
        }
    }
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let mut ctx = load_context(&options.common, Access::Write)?;
    let draft = TaskDraft {
        title: options.title,
        description: options.description,
        priority: options.priority,
        due_date: options.due,
        category: options.category,
    };

    let task = ctx.store.create(&draft)?;
    ctx.ensure_saved()?;

    let today = today();
    let mut human = HumanOutput::new("Task created");
    push_task_fields(&mut human, &task, today);
    ctx.drain_warnings(&mut human);
    human.push_next_step(format!("taskmaster toggle {}", task.id));

    emit_success(
        ctx.output_options(&options.common),
        "add",
        &TaskView::new(&task, today),
        &human,
    )
}

pub fn run_edit(options: EditOptions) -> Result<()> {
    let status = options
        .status
        .as_deref()
        .map(TaskStatus::parse_arg)
        .transpose()?;
    let patch = TaskPatch {
        title: options.title,
        description: options.description,
        priority: options.priority,
        due_date: options.due,
        category: options.category,
        status,
    };
    if patch.is_empty() {
        return Err(Error::InvalidArgument(
            "nothing to edit; pass at least one field flag".to_string(),
        ));
    }

    let mut ctx = load_context(&options.common, Access::Write)?;
    let task = ctx.store.update(&options.id, &patch)?;
    ctx.ensure_saved()?;

    let today = today();
    let mut human = HumanOutput::new("Task updated");
    push_task_fields(&mut human, &task, today);
    ctx.drain_warnings(&mut human);

    emit_success(
        ctx.output_options(&options.common),
        "edit",
        &TaskView::new(&task, today),
        &human,
    )
}

pub fn run_toggle(options: IdOptions) -> Result<()> {
    let mut ctx = load_context(&options.common, Access::Write)?;
    let task = ctx.store.toggle_completion(&options.id)?;
    ctx.ensure_saved()?;

    let today = today();
    let header = if task.is_completed() {
        "Task completed"
    } else {
        "Task reopened"
    };
    let mut human = HumanOutput::new(header);
    push_task_fields(&mut human, &task, today);
    ctx.drain_warnings(&mut human);

    emit_success(
        ctx.output_options(&options.common),
        "toggle",
        &TaskView::new(&task, today),
        &human,
    )
}

pub fn run_delete(options: IdOptions) -> Result<()> {
    let mut ctx = load_context(&options.common, Access::Write)?;
    if ctx.store.get(&options.id).is_none() {
        return Err(Error::TaskNotFound(options.id));
    }
    let task = ctx
        .store
        .delete(&options.id)
        .ok_or_else(|| Error::TaskNotFound(options.id.clone()))?;
    ctx.ensure_saved()?;

    let today = today();
    let mut human = HumanOutput::new("Task deleted");
    human.push_field("ID", task.id.clone());
    human.push_field("Title", task.title.clone());
    ctx.drain_warnings(&mut human);

    emit_success(
        ctx.output_options(&options.common),
        "delete",
        &TaskView::new(&task, today),
        &human,
    )
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let status = options
        .status
        .as_deref()
        .map(StatusFilter::parse)
        .transpose()?;
    let sort_by = options.sort.as_deref().map(SortKey::parse).transpose()?;

    let mut ctx = load_context(&options.common, Access::Read)?;
    ctx.store.update_filter(FilterUpdate {
        status,
        search_query: options.search,
    });
    if let Some(sort_by) = sort_by {
        ctx.store.set_sort_by(sort_by);
    }

    let today = today();
    let store = &ctx.store;
    let output = TaskListOutput {
        filter: store.filter(),
        sort_by: store.sort_by(),
        total: store.tasks().len(),
        visible: store.view().len(),
        tasks: store
            .view()
            .iter()
            .map(|task| TaskView::new(task, today))
            .collect(),
    };

    let mut human = HumanOutput::new("Tasks");
    human.push_field("Total", output.total.to_string());
    human.push_field("Shown", output.visible.to_string());
    human.push_field("Status", store.filter().status.as_str());
    if !store.filter().search_query.trim().is_empty() {
        human.push_field("Search", store.filter().search_query.clone());
    }
    human.push_field("Sort", store.sort_by().as_str());
    for task in store.view() {
        human.push_row(format_task_line(task, today));
    }
    ctx.drain_warnings(&mut human);
    if output.total == 0 {
        human.push_next_step("taskmaster add <title>");
    }

    emit_success(ctx.output_options(&options.common), "list", &output, &human)
}

pub fn run_bulk(options: BulkOptions) -> Result<()> {
    let mut ctx = load_context(&options.common, Access::Write)?;
    let unknown: Vec<String> = options
        .ids
        .iter()
        .filter(|id| ctx.store.get(id).is_none())
        .cloned()
        .collect();

    let affected = match options.action {
        BulkAction::Complete => ctx.store.complete_many(&options.ids),
        BulkAction::Archive => ctx.store.archive_many(&options.ids),
        BulkAction::Delete => ctx.store.delete_many(&options.ids),
    };
    ctx.ensure_saved()?;

    let output = BulkOutput {
        action: options.action,
        requested: options.ids.len(),
        affected,
        unknown,
    };

    let mut human = HumanOutput::new(options.action.header());
    human.push_field("Requested", output.requested.to_string());
    human.push_field("Affected", output.affected.to_string());
    for id in &output.unknown {
        human.push_warning(format!("unknown task id '{id}' skipped"));
    }
    ctx.drain_warnings(&mut human);

    emit_success(
        ctx.output_options(&options.common),
        options.action.command(),
        &output,
        &human,
    )
}

fn load_context(common: &CommonOptions, access: Access) -> Result<TaskContext> {
    let (data_dir, config) = common.load_config()?;
    let storage = FileStorage::new(data_dir).with_lock_timeout(config.storage.lock_timeout_ms);
    let repository = TaskRepository::new(Arc::new(storage), config.storage.tasks_key.clone());
    let mut store =
        TaskStore::new(repository).with_view(config.view.filter(), config.view.sort_by);

    let warnings = Rc::new(RefCell::new(Vec::new()));
    if let LoadOutcome::Failed(message) = store.load() {
        match access {
            Access::Write => {
                return Err(Error::PersistenceRead(format!(
                    "{message}; refusing to overwrite unreadable task data"
                )))
            }
            Access::Read => warnings
                .borrow_mut()
                .push(format!("stored tasks ignored: {message}")),
        }
    }

    // Subscribe after loading so the sink only sees this command's changes.
    let destination = EventDestination::parse(common.events.as_deref());
    let events_to_stdout = matches!(destination, Some(EventDestination::Stdout));
    if let Some(destination) = destination {
        let mut sink = destination.open()?;
        let sink_warnings = Rc::clone(&warnings);
        store.subscribe(move |event, _view| {
            if let Err(err) = sink.emit(event) {
                warn!(error = %err, "event output failed");
                sink_warnings
                    .borrow_mut()
                    .push(format!("event output failed: {err}"));
            }
        });
    }

    Ok(TaskContext {
        store,
        warnings,
        events_to_stdout,
    })
}

fn today() -> NaiveDate {
    DefaultClock.local().date_naive()
}

fn push_task_fields(human: &mut HumanOutput, task: &Task, today: NaiveDate) {
    human.push_field("ID", task.id.clone());
    human.push_field("Title", task.title.clone());
    human.push_field("Status", task.status().as_str());
    human.push_field("Priority", task.priority.as_str());
    if let Some(due) = task.due_date {
        let mut value = format_due_date(due);
        if task.is_overdue(today) {
            value.push_str(" (overdue)");
        }
        human.push_field("Due", value);
    }
    if let Some(category) = task.category.as_ref() {
        human.push_field("Category", category.clone());
    }
    if let Some(description) = task.description.as_ref() {
        human.push_field("Description", description.clone());
    }
}

fn format_task_line(task: &Task, today: NaiveDate) -> String {
    let mut line = format!(
        "[{}][{}] {} {}",
        task.status(),
        task.priority,
        task.id,
        task.title
    );
    if let Some(due) = task.due_date {
        if task.is_overdue(today) {
            line.push_str(&format!(" (due: {}, overdue)", format_due_date(due)));
        } else {
            line.push_str(&format!(" (due: {})", format_due_date(due)));
        }
    }
    if let Some(category) = task.category.as_ref() {
        line.push_str(&format!(" (category: {category})"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskPriority;
    use chrono::{TimeZone, Utc};

    fn task() -> Task {
        let mut task = Task::new(
            "task_1",
            "File taxes",
            TaskPriority::High,
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        );
        task.due_date = NaiveDate::from_ymd_opt(2024, 4, 15);
        task.category = Some("finance".to_string());
        task
    }

    #[test]
    fn task_line_marks_overdue() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(
            format_task_line(&task(), today),
            "[active][high] task_1 File taxes (due: Apr 15, 2024, overdue) (category: finance)"
        );
    }

    #[test]
    fn completed_task_is_never_overdue_in_output() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let mut done = task();
        done.set_status(TaskStatus::Completed);
        let line = format_task_line(&done, today);
        assert!(line.contains("(due: Apr 15, 2024)"));
        assert!(!line.contains("overdue"));
    }

    #[test]
    fn task_view_flattens_task_fields() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let task = task();
        let value = serde_json::to_value(TaskView::new(&task, today)).expect("serialize");
        assert_eq!(value["id"], "task_1");
        assert_eq!(value["dueDate"], "2024-04-15");
        assert_eq!(value["overdue"], true);
    }
}
