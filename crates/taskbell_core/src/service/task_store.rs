//! Task store: in-memory source of truth for the task collection.
//!
//! # Responsibility
//! - Apply task/subtask mutations atomically from the caller's view.
//! - Flush persistence and keep reminders consistent after every mutation.
//! - Publish snapshots to observers.
//!
//! # Invariants
//! - No stored task is ever empty: deleting the last subtask removes the task.
//! - Every delete and deadline change withdraws the subtask's reminders.
//! - Persistence and notification failures never fail or roll back a
//!   mutation.
//! - Selection never points at a deleted subtask.

use crate::clock::Clock;
use crate::model::lead_time::LeadTime;
use crate::model::selection::{Selection, SubtaskRef};
use crate::model::task::{
    normalize_memo, normalize_title, ModelValidationError, Subtask, SubtaskId, Task, TaskId,
};
use crate::notify::{AuthorizationStatus, NotificationCenter, ReminderId};
use crate::repo::kv_repo::KvRepository;
use crate::service::persistence::{LoadStatus, TaskPersistence};
use crate::service::reminder_scheduler::{ReminderRegistry, ReminderScheduler};
use crate::service::validator::{validate_collection, ValidationReport};
use log::info;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors returned to store callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStoreError {
    /// User-entered field failed normalization.
    InvalidInput(ModelValidationError),
    TaskNotFound(TaskId),
    SubtaskNotFound {
        task_id: TaskId,
        subtask_id: SubtaskId,
    },
}

impl Display for TaskStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(err) => write!(f, "{err}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::SubtaskNotFound {
                task_id,
                subtask_id,
            } => write!(f, "subtask {subtask_id} not found in task {task_id}"),
        }
    }
}

impl Error for TaskStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidInput(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelValidationError> for TaskStoreError {
    fn from(value: ModelValidationError) -> Self {
        Self::InvalidInput(value)
    }
}

pub type StoreResult<T> = Result<T, TaskStoreError>;

/// User input for a new subtask.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubtaskDraft {
    pub title: String,
    /// Unix epoch milliseconds.
    pub deadline: Option<i64>,
    pub memo: Option<String>,
    /// Reminder offset; no reminder when `None` or when there is no deadline.
    pub lead: Option<LeadTime>,
}

impl SubtaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_deadline(mut self, deadline_ms: i64, lead: Option<LeadTime>) -> Self {
        self.deadline = Some(deadline_ms);
        self.lead = lead;
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }
}

/// Result of an add flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddedSubtask {
    pub task_id: TaskId,
    pub subtask_id: SubtaskId,
    /// Reminder registered for the new subtask, if any.
    pub reminder: Option<ReminderId>,
}

/// Result of a delete flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Whether the owning task was removed.
    pub task_removed: bool,
    pub cancelled_reminders: usize,
}

/// Handle returned by `subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Snapshot observer invoked after every committed mutation.
pub type TaskObserver = Box<dyn FnMut(&[Task]) + Send>;

/// Orchestrates tasks, persistence and reminders.
///
/// One instance is owned by the host for the lifetime of the process and
/// passed to UI layers by reference.
pub struct TaskStore<K: KvRepository, N: NotificationCenter> {
    tasks: Vec<Task>,
    persistence: TaskPersistence<K>,
    scheduler: ReminderScheduler<N>,
    clock: Box<dyn Clock + Send>,
    selection: Selection,
    revision: u64,
    observers: Vec<(SubscriptionId, TaskObserver)>,
    next_subscription: u64,
    load_status: LoadStatus,
    startup_report: ValidationReport,
}

impl<K: KvRepository, N: NotificationCenter> TaskStore<K, N> {
    /// Loads persisted state and runs the startup validation pass.
    ///
    /// Never fails: unreadable state degrades to an empty collection and is
    /// reported through `load_status`.
    pub fn open(repo: K, center: N, clock: impl Clock + Send + 'static) -> Self {
        let persistence = TaskPersistence::new(repo);
        let loaded_tasks = persistence.load();
        let loaded_reminders = persistence.load_reminders();
        let scheduler = ReminderScheduler::new(center, loaded_reminders.value);

        let mut store = Self {
            tasks: loaded_tasks.value,
            persistence,
            scheduler,
            clock: Box::new(clock),
            selection: Selection::None,
            revision: 0,
            observers: Vec::new(),
            next_subscription: 0,
            load_status: loaded_tasks.status,
            startup_report: ValidationReport::default(),
        };
        info!(
            "event=store_open module=store status=ok tasks={} reminders={} degraded={}",
            store.tasks.len(),
            store.scheduler.registry().len(),
            store.load_status.is_degraded()
        );
        store.startup_report = store.validate();
        store
    }

    /// Current task collection in display order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    pub fn subtask(&self, task_id: TaskId, subtask_id: SubtaskId) -> Option<&Subtask> {
        self.task(task_id)?.subtask(subtask_id)
    }

    /// Monotonic counter bumped by every committed mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// How the initial load resolved.
    pub fn load_status(&self) -> &LoadStatus {
        &self.load_status
    }

    /// Report produced by the validation pass run in `open`.
    pub fn startup_report(&self) -> &ValidationReport {
        &self.startup_report
    }

    pub fn reminders(&self) -> &ReminderRegistry {
        self.scheduler.registry()
    }

    pub fn notifications(&self) -> &N {
        self.scheduler.center()
    }

    pub fn notifications_mut(&mut self) -> &mut N {
        self.scheduler.center_mut()
    }

    pub fn notification_authorization(&self) -> AuthorizationStatus {
        self.scheduler.authorization()
    }

    /// Asks the platform for notification permission; intended for startup.
    pub fn request_notification_authorization(&mut self) -> AuthorizationStatus {
        self.scheduler.request_authorization()
    }

    /// Registers an observer called with the snapshot after each mutation.
    pub fn subscribe(&mut self, observer: TaskObserver) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, observer));
        id
    }

    /// Removes an observer. Returns `false` when it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(current, _)| *current != id);
        self.observers.len() != before
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Selects one existing subtask.
    pub fn select_subtask(&mut self, task_id: TaskId, subtask_id: SubtaskId) -> StoreResult<()> {
        self.subtask_position(task_id, subtask_id)?;
        self.selection = Selection::Selected(SubtaskRef {
            task_id,
            subtask_id,
        });
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection = Selection::None;
    }

    /// Creates a task owning one subtask and schedules its reminder.
    pub fn add_task(&mut self, title: &str, first: SubtaskDraft) -> StoreResult<AddedSubtask> {
        let lead = first.lead;
        let subtask = subtask_from_draft(&first)?;
        let task = Task::new(title, subtask)?;
        let task_id = task.id;
        let subtask_id = task.subtasks[0].id;

        let reminder = self.schedule_for(&task.subtasks[0], lead);
        self.tasks.push(task);
        info!(
            "event=task_add module=store status=ok task_id={} subtask_id={} reminder={}",
            task_id,
            subtask_id,
            reminder.is_some()
        );
        self.commit(reminder.is_some());

        Ok(AddedSubtask {
            task_id,
            subtask_id,
            reminder,
        })
    }

    /// Appends a subtask to an existing task and schedules its reminder.
    pub fn add_subtask(&mut self, task_id: TaskId, draft: SubtaskDraft) -> StoreResult<AddedSubtask> {
        let index = self.task_position(task_id)?;
        let subtask = subtask_from_draft(&draft)?;
        let subtask_id = subtask.id;

        let reminder = self.schedule_for(&subtask, draft.lead);
        self.tasks[index].subtasks.push(subtask);
        info!(
            "event=subtask_add module=store status=ok task_id={} subtask_id={} reminder={}",
            task_id,
            subtask_id,
            reminder.is_some()
        );
        self.commit(reminder.is_some());

        Ok(AddedSubtask {
            task_id,
            subtask_id,
            reminder,
        })
    }

    /// Replaces title and memo in place. Reminders are left untouched.
    pub fn update_subtask(
        &mut self,
        task_id: TaskId,
        subtask_id: SubtaskId,
        title: &str,
        memo: Option<&str>,
    ) -> StoreResult<()> {
        let (task_index, subtask_index) = self.subtask_position(task_id, subtask_id)?;
        let title = normalize_title(title)?;
        let memo = normalize_memo(memo)?;

        let subtask = &mut self.tasks[task_index].subtasks[subtask_index];
        subtask.title = title;
        subtask.memo = memo;
        info!(
            "event=subtask_update module=store status=ok task_id={} subtask_id={}",
            task_id, subtask_id
        );
        self.commit(false);
        Ok(())
    }

    /// Replaces the deadline, withdrawing old reminders first.
    ///
    /// A new reminder is scheduled when both `deadline` and `lead` are set.
    pub fn set_subtask_deadline(
        &mut self,
        task_id: TaskId,
        subtask_id: SubtaskId,
        deadline: Option<i64>,
        lead: Option<LeadTime>,
    ) -> StoreResult<Option<ReminderId>> {
        let (task_index, subtask_index) = self.subtask_position(task_id, subtask_id)?;
        let cancelled = self.scheduler.cancel_all(subtask_id);

        self.tasks[task_index].subtasks[subtask_index].deadline = deadline;
        let reminder = match lead {
            Some(lead) => {
                let now_ms = self.clock.now_ms();
                self.scheduler
                    .schedule(&self.tasks[task_index].subtasks[subtask_index], lead, now_ms)
                    .map(|pending| pending.id)
            }
            None => None,
        };
        info!(
            "event=subtask_deadline module=store status=ok task_id={} subtask_id={} cancelled={} reminder={}",
            task_id,
            subtask_id,
            cancelled,
            reminder.is_some()
        );
        self.commit(cancelled > 0 || reminder.is_some());
        Ok(reminder)
    }

    pub fn rename_task(&mut self, task_id: TaskId, title: &str) -> StoreResult<()> {
        let index = self.task_position(task_id)?;
        self.tasks[index].title = normalize_title(title)?;
        info!(
            "event=task_rename module=store status=ok task_id={}",
            task_id
        );
        self.commit(false);
        Ok(())
    }

    /// Moves a subtask within its task. Returns the clamped final index.
    pub fn move_subtask(
        &mut self,
        task_id: TaskId,
        subtask_id: SubtaskId,
        to_index: usize,
    ) -> StoreResult<usize> {
        let (task_index, from_index) = self.subtask_position(task_id, subtask_id)?;
        let subtasks = &mut self.tasks[task_index].subtasks;
        let subtask = subtasks.remove(from_index);
        let target = to_index.min(subtasks.len());
        subtasks.insert(target, subtask);
        info!(
            "event=subtask_move module=store status=ok task_id={} subtask_id={} from={} to={}",
            task_id, subtask_id, from_index, target
        );
        self.commit(false);
        Ok(target)
    }

    /// Removes one subtask, cascading to its task when it was the last one.
    pub fn delete_subtask(
        &mut self,
        task_id: TaskId,
        subtask_id: SubtaskId,
    ) -> StoreResult<DeleteOutcome> {
        let task_index = self.task_position(task_id)?;
        self.tasks[task_index]
            .remove_subtask(subtask_id)
            .ok_or(TaskStoreError::SubtaskNotFound {
                task_id,
                subtask_id,
            })?;
        let cancelled = self.scheduler.cancel_all(subtask_id);

        let task_removed = self.tasks[task_index].subtasks.is_empty();
        if task_removed {
            self.tasks.remove(task_index);
        }
        if self.selection.is_subtask(subtask_id) {
            self.selection = Selection::None;
        }
        info!(
            "event=subtask_delete module=store status=ok task_id={} subtask_id={} cancelled={} task_removed={}",
            task_id, subtask_id, cancelled, task_removed
        );
        self.commit(cancelled > 0);

        Ok(DeleteOutcome {
            task_removed,
            cancelled_reminders: cancelled,
        })
    }

    /// Removes a task and withdraws every reminder of its subtasks.
    pub fn delete_task(&mut self, task_id: TaskId) -> StoreResult<DeleteOutcome> {
        let index = self.task_position(task_id)?;
        let task = self.tasks.remove(index);
        let cancelled = task
            .subtasks
            .iter()
            .map(|subtask| self.scheduler.cancel_all(subtask.id))
            .sum::<usize>();

        if self.selection.is_in_task(task_id) {
            self.selection = Selection::None;
        }
        info!(
            "event=task_delete module=store status=ok task_id={} subtasks={} cancelled={}",
            task_id,
            task.subtasks.len(),
            cancelled
        );
        self.commit(cancelled > 0);

        Ok(DeleteOutcome {
            task_removed: true,
            cancelled_reminders: cancelled,
        })
    }

    /// Checks collection consistency and emits overdue notifications.
    ///
    /// Issues are reported, never repaired. Afterwards fired reminders of
    /// owned subtasks are pruned; entries of orphaned subtasks are kept.
    pub fn validate(&mut self) -> ValidationReport {
        let now_ms = self.clock.now_ms();
        let report = validate_collection(
            &self.tasks,
            self.scheduler
                .registry()
                .iter()
                .map(|reminder| (reminder.subtask_id, reminder.subtask_title.as_str())),
            now_ms,
        );

        for target in &report.overdue {
            let subtask = self
                .tasks
                .iter()
                .find(|task| task.id == target.task_id)
                .and_then(|task| task.subtask(target.subtask_id));
            if let Some(subtask) = subtask {
                self.scheduler.notify_overdue(subtask);
            }
        }
        self.prune_fired_reminders(now_ms);
        report
    }

    fn prune_fired_reminders(&mut self, now_ms: i64) {
        let owned = self
            .tasks
            .iter()
            .flat_map(|task| task.subtasks.iter().map(|subtask| subtask.id))
            .collect::<HashSet<_>>();
        let pruned = self
            .scheduler
            .prune_fired(now_ms, |subtask_id| owned.contains(&subtask_id));
        if pruned > 0 {
            self.persistence.save_reminders(self.scheduler.registry());
        }
    }

    fn schedule_for(&mut self, subtask: &Subtask, lead: Option<LeadTime>) -> Option<ReminderId> {
        let lead = lead?;
        let now_ms = self.clock.now_ms();
        self.scheduler
            .schedule(subtask, lead, now_ms)
            .map(|pending| pending.id)
    }

    fn task_position(&self, task_id: TaskId) -> StoreResult<usize> {
        self.tasks
            .iter()
            .position(|task| task.id == task_id)
            .ok_or(TaskStoreError::TaskNotFound(task_id))
    }

    fn subtask_position(&self, task_id: TaskId, subtask_id: SubtaskId) -> StoreResult<(usize, usize)> {
        let task_index = self.task_position(task_id)?;
        let subtask_index = self.tasks[task_index]
            .subtasks
            .iter()
            .position(|subtask| subtask.id == subtask_id)
            .ok_or(TaskStoreError::SubtaskNotFound {
                task_id,
                subtask_id,
            })?;
        Ok((task_index, subtask_index))
    }

    /// Flushes persistence and notifies observers. Failures are logged only.
    fn commit(&mut self, reminders_changed: bool) {
        self.revision += 1;
        self.persistence.save(&self.tasks);
        if reminders_changed {
            self.persistence.save_reminders(self.scheduler.registry());
        }
        for (_, observer) in &mut self.observers {
            observer(&self.tasks);
        }
    }
}

fn subtask_from_draft(draft: &SubtaskDraft) -> Result<Subtask, ModelValidationError> {
    Subtask::new(&draft.title, draft.deadline, draft.memo.as_deref())
}
