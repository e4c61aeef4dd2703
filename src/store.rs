//! The task store: single owner of the task collection and its view.
//!
//! Every operation follows the same path: change the canonical collection
//! (or the view criteria), re-derive the view, persist if the collection
//! changed, then notify subscribers. Nothing outside this type can touch
//! the collection or the derived view, so the two never disagree.
//!
//! Persistence is best effort. A failed save is logged and remembered in
//! [`TaskStore::last_save_error`], but the in-memory change stands.

use std::collections::HashSet;
use std::fmt;

use mockable::{Clock, DefaultClock};
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::events::{Event, EventKind};
use crate::query::{derive_view, FilterUpdate, SortKey, TaskFilter};
use crate::storage::TaskRepository;
use crate::task::{generate_task_id, Task, TaskDraft, TaskPatch, TaskStatus};
use crate::validation::parse_draft;

/// Callback invoked with each change and the freshly derived view.
pub type Subscriber = Box<dyn FnMut(&Event, &[Task])>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Result of [`TaskStore::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A stored collection replaced the in-memory one.
    Loaded(usize),
    /// Nothing stored yet.
    Empty,
    /// The stored blob could not be read; the collection was left as is.
    Failed(String),
}

pub struct TaskStore {
    tasks: Vec<Task>,
    filter: TaskFilter,
    sort_by: SortKey,
    view: Vec<Task>,
    repository: TaskRepository,
    clock: Box<dyn Clock>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
    last_save_error: Option<String>,
}

impl fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStore")
            .field("tasks", &self.tasks.len())
            .field("filter", &self.filter)
            .field("sort_by", &self.sort_by)
            .field("view", &self.view.len())
            .field("repository", &self.repository)
            .field("subscribers", &self.subscribers.len())
            .field("last_save_error", &self.last_save_error)
            .finish()
    }
}

impl TaskStore {
    /// Empty store using the system clock. Call [`TaskStore::load`] to pick
    /// up saved tasks.
    pub fn new(repository: TaskRepository) -> Self {
        Self::with_clock(repository, DefaultClock)
    }

    pub fn with_clock(repository: TaskRepository, clock: impl Clock + 'static) -> Self {
        Self {
            tasks: Vec::new(),
            filter: TaskFilter::default(),
            sort_by: SortKey::default(),
            view: Vec::new(),
            repository,
            clock: Box::new(clock),
            subscribers: Vec::new(),
            next_subscription: 0,
            last_save_error: None,
        }
    }

    /// Set the initial view criteria without publishing a change.
    pub fn with_view(mut self, filter: TaskFilter, sort_by: SortKey) -> Self {
        self.filter = filter;
        self.sort_by = sort_by;
        self.refresh_view();
        self
    }

    // =========================================================================
    // Read accessors
    // =========================================================================

    /// Canonical collection in insertion order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn filter(&self) -> &TaskFilter {
        &self.filter
    }

    pub fn sort_by(&self) -> SortKey {
        self.sort_by
    }

    /// Filtered and sorted tasks.
    pub fn view(&self) -> &[Task] {
        &self.view
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Message of the most recent failed automatic save.
    pub fn last_save_error(&self) -> Option<&str> {
        self.last_save_error.as_deref()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Validate `draft` and append a new active task.
    ///
    /// Invalid input returns [`Error::Validation`] and leaves the store
    /// untouched.
    pub fn create(&mut self, draft: &TaskDraft) -> Result<Task> {
        let valid = parse_draft(draft).map_err(Error::Validation)?;
        let now = self.clock.utc();

        let mut task = Task::new(self.allocate_id(), valid.title, valid.priority, now);
        task.description = valid.description;
        task.due_date = valid.due_date;
        task.category = valid.category;

        debug!(id = %task.id, "creating task");
        self.tasks.push(task.clone());
        self.apply_change(Event::new(EventKind::TaskCreated, now).with_task_ids([task.id.clone()]));
        Ok(task)
    }

    /// Merge `patch` into the task with `id`.
    ///
    /// The merged record is validated as a whole; `id` and `created_at`
    /// never change.
    pub fn update(&mut self, id: &str, patch: &TaskPatch) -> Result<Task> {
        let index = self.require(id)?;
        let mut updated = self.tasks[index].clone();

        let draft = patch.merge_into(updated.to_draft());
        let valid = parse_draft(&draft).map_err(Error::Validation)?;
        let now = self.clock.utc();

        updated.title = valid.title;
        updated.description = valid.description;
        updated.priority = valid.priority;
        updated.due_date = valid.due_date;
        updated.category = valid.category;
        if let Some(status) = patch.status {
            updated.set_status(status);
        }
        updated.touch(now);

        debug!(id = %updated.id, "updating task");
        self.tasks[index] = updated.clone();
        self.apply_change(Event::new(EventKind::TaskUpdated, now).with_task_ids([updated.id.clone()]));
        Ok(updated)
    }

    /// Remove the task with `id`, returning it if it existed.
    pub fn delete(&mut self, id: &str) -> Option<Task> {
        let removed = self
            .tasks
            .iter()
            .position(|task| task.id == id)
            .map(|index| self.tasks.remove(index));
        if removed.is_none() {
            debug!(id, "delete of unknown task");
        }

        let now = self.clock.utc();
        let ids: Vec<String> = removed.iter().map(|task| task.id.clone()).collect();
        self.apply_change(Event::new(EventKind::TaskDeleted, now).with_task_ids(ids));
        removed
    }

    /// Flip completion of the task with `id` between active and completed.
    pub fn toggle_completion(&mut self, id: &str) -> Result<Task> {
        let index = self.require(id)?;
        let now = self.clock.utc();

        let task = &mut self.tasks[index];
        task.toggle_completion();
        task.touch(now);
        let toggled = task.clone();

        debug!(id = %toggled.id, status = %toggled.status(), "toggled task");
        self.apply_change(
            Event::new(EventKind::TaskCompletionToggled, now).with_task_ids([toggled.id.clone()]),
        );
        Ok(toggled)
    }

    /// Mark every listed task completed. Unknown ids and tasks that are
    /// already completed are skipped. Returns the number changed.
    pub fn complete_many<S: AsRef<str>>(&mut self, ids: &[S]) -> usize {
        self.apply_to_many(ids, EventKind::TasksCompleted, |task| {
            if task.is_completed() {
                return false;
            }
            task.set_status(TaskStatus::Completed);
            true
        })
    }

    /// Archive every listed task. Returns the number changed.
    pub fn archive_many<S: AsRef<str>>(&mut self, ids: &[S]) -> usize {
        self.apply_to_many(ids, EventKind::TasksArchived, |task| {
            if task.status() == TaskStatus::Archived {
                return false;
            }
            task.set_status(TaskStatus::Archived);
            true
        })
    }

    /// Delete every listed task. Returns the number removed.
    pub fn delete_many<S: AsRef<str>>(&mut self, ids: &[S]) -> usize {
        let wanted: HashSet<&str> = ids.iter().map(AsRef::as_ref).collect();
        let mut removed = Vec::new();
        self.tasks.retain(|task| {
            if wanted.contains(task.id.as_str()) {
                removed.push(task.id.clone());
                false
            } else {
                true
            }
        });

        let count = removed.len();
        let now = self.clock.utc();
        self.apply_change(Event::new(EventKind::TasksDeleted, now).with_task_ids(removed));
        count
    }

    // =========================================================================
    // View criteria
    // =========================================================================

    pub fn set_filter(&mut self, filter: TaskFilter) {
        self.filter = filter;
        let now = self.clock.utc();
        self.apply_change(Event::new(EventKind::FilterChanged, now));
    }

    /// Merge a partial change into the active filter.
    pub fn update_filter(&mut self, update: FilterUpdate) {
        let filter = update.apply(self.filter.clone());
        self.set_filter(filter);
    }

    pub fn set_sort_by(&mut self, sort_by: SortKey) {
        self.sort_by = sort_by;
        let now = self.clock.utc();
        self.apply_change(Event::new(EventKind::SortChanged, now));
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Replace the collection with the stored one.
    ///
    /// Never fails: a missing slot or unreadable blob is logged and the
    /// current collection is kept.
    pub fn load(&mut self) -> LoadOutcome {
        match self.repository.load() {
            Ok(Some(tasks)) => {
                let count = tasks.len();
                debug!(count, key = self.repository.key(), "loaded tasks");
                self.tasks = tasks;
                let now = self.clock.utc();
                self.apply_change(Event::new(EventKind::TasksLoaded, now));
                LoadOutcome::Loaded(count)
            }
            Ok(None) => {
                debug!(key = self.repository.key(), "no stored tasks");
                LoadOutcome::Empty
            }
            Err(err) => {
                error!(key = self.repository.key(), error = %err, "error loading tasks");
                LoadOutcome::Failed(err.to_string())
            }
        }
    }

    /// Write the canonical collection to storage.
    pub fn save(&self) -> Result<()> {
        self.repository.save(&self.tasks, self.clock.utc())
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Register `subscriber` to be called after every change.
    pub fn subscribe(&mut self, subscriber: impl FnMut(&Event, &[Task]) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    /// Remove a subscriber. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn apply_change(&mut self, mut event: Event) {
        self.refresh_view();
        if event.event.is_mutation() {
            self.persist();
        }
        event.visible = self.view.len();
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(&event, &self.view);
        }
    }

    fn refresh_view(&mut self) {
        self.view = derive_view(&self.tasks, &self.filter, self.sort_by);
    }

    fn persist(&mut self) {
        match self.save() {
            Ok(()) => self.last_save_error = None,
            Err(err) => {
                error!(key = self.repository.key(), error = %err, "error saving tasks");
                self.last_save_error = Some(err.to_string());
            }
        }
    }

    fn apply_to_many<S, F>(&mut self, ids: &[S], kind: EventKind, mut change: F) -> usize
    where
        S: AsRef<str>,
        F: FnMut(&mut Task) -> bool,
    {
        let wanted: HashSet<&str> = ids.iter().map(AsRef::as_ref).collect();
        let now = self.clock.utc();
        let mut changed = Vec::new();
        for task in self
            .tasks
            .iter_mut()
            .filter(|task| wanted.contains(task.id.as_str()))
        {
            if change(task) {
                task.touch(now);
                changed.push(task.id.clone());
            }
        }

        let count = changed.len();
        self.apply_change(Event::new(kind, now).with_task_ids(changed));
        count
    }

    fn require(&self, id: &str) -> Result<usize> {
        self.tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }

    fn allocate_id(&self) -> String {
        loop {
            let id = generate_task_id();
            if self.get(&id).is_none() {
                return id;
            }
        }
    }
}
