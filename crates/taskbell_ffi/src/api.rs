//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose one owned task session handle to Dart via FRB.
//! - Translate string ids and minute counts into core types.
//! - Hand queued notification commands to the host for execution.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Ids cross the boundary as UTF-8 UUID strings.

use log::{error, info};
use std::path::PathBuf;
use std::sync::Mutex;
use taskbell_core::db::open_db;
use taskbell_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    AuthorizationStatus, LeadTime, NotificationCommand, QueuedNotificationCenter, SqliteKvRepository,
    SubtaskDraft, SubtaskId, SystemClock, Task, TaskId, TaskStore, Trigger,
};
use uuid::Uuid;

const DB_FILE_NAME: &str = "taskbell.sqlite3";
const DB_PATH_ENV: &str = "TASKBELL_DB_PATH";

type SessionStore = TaskStore<SqliteKvRepository, QueuedNotificationCenter>;

/// Minimal health-check API for FRB smoke integration.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Subtask row for list rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtaskItem {
    pub subtask_id: String,
    pub title: String,
    pub deadline_epoch_ms: Option<i64>,
    pub memo: Option<String>,
    /// Lead-time reminders still pending for this subtask.
    pub pending_reminders: u32,
}

/// Task row for list rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskItem {
    pub task_id: String,
    pub title: String,
    pub subtasks: Vec<SubtaskItem>,
}

/// Generic action response envelope for mutation calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskActionResponse {
    pub ok: bool,
    pub task_id: Option<String>,
    pub subtask_id: Option<String>,
    /// Whether the owning task was removed by a subtask delete.
    pub task_removed: bool,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl TaskActionResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            task_id: None,
            subtask_id: None,
            task_removed: false,
            message: message.into(),
        }
    }

    fn with_ids(mut self, task_id: TaskId, subtask_id: Option<SubtaskId>) -> Self {
        self.task_id = Some(task_id.to_string());
        self.subtask_id = subtask_id.map(|id| id.to_string());
        self
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            task_id: None,
            subtask_id: None,
            task_removed: false,
            message: message.into(),
        }
    }
}

/// Validation summary envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResponse {
    pub ok: bool,
    /// One user-facing line per consistency issue.
    pub issues: Vec<String>,
    pub overdue_count: u32,
    pub message: String,
}

/// Notification instruction for the Dart notification plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationCommandItem {
    /// `request_authorization|schedule|cancel`.
    pub kind: String,
    pub reminder_ids: Vec<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    /// `None` means deliver immediately.
    pub trigger_epoch_ms: Option<i64>,
}

/// Owned task session; Dart holds exactly one for the app lifetime.
#[flutter_rust_bridge::frb(opaque)]
pub struct TaskSession {
    store: Mutex<SessionStore>,
}

impl TaskSession {
    /// Opens the task database and runs the startup validation pass.
    ///
    /// `db_path` falls back to `TASKBELL_DB_PATH`, then the temp directory.
    #[flutter_rust_bridge::frb(sync)]
    pub fn open(db_path: Option<String>) -> Result<TaskSession, String> {
        let path = resolve_db_path(db_path);
        let conn = open_db(&path).map_err(|err| format!("task DB open failed: {err}"))?;
        let repo = SqliteKvRepository::try_new(conn)
            .map_err(|err| format!("task repo init failed: {err}"))?;
        let store = TaskStore::open(repo, QueuedNotificationCenter::new(), SystemClock);
        info!(
            "event=session_open module=ffi status=ok tasks={} load_status_degraded={}",
            store.tasks().len(),
            store.load_status().is_degraded()
        );
        Ok(Self {
            store: Mutex::new(store),
        })
    }

    /// Returns the current task snapshot in display order.
    #[flutter_rust_bridge::frb(sync)]
    pub fn list_tasks(&self) -> Vec<TaskItem> {
        self.with_store("list_tasks", |store| {
            store
                .tasks()
                .iter()
                .map(|task| to_task_item(store, task))
                .collect()
        })
        .unwrap_or_default()
    }

    /// Creates a task with its first subtask.
    #[flutter_rust_bridge::frb(sync)]
    pub fn add_task(
        &self,
        title: String,
        subtask_title: String,
        deadline_epoch_ms: Option<i64>,
        memo: Option<String>,
        lead_minutes: Option<u32>,
    ) -> TaskActionResponse {
        let draft = match build_draft(subtask_title, deadline_epoch_ms, memo, lead_minutes) {
            Ok(draft) => draft,
            Err(err) => return TaskActionResponse::failure(format!("add_task failed: {err}")),
        };
        self.mutate("add_task", |store| {
            let added = store.add_task(&title, draft)?;
            Ok(TaskActionResponse::success("Task created.")
                .with_ids(added.task_id, Some(added.subtask_id)))
        })
    }

    /// Appends a subtask to an existing task.
    #[flutter_rust_bridge::frb(sync)]
    pub fn add_subtask(
        &self,
        task_id: String,
        subtask_title: String,
        deadline_epoch_ms: Option<i64>,
        memo: Option<String>,
        lead_minutes: Option<u32>,
    ) -> TaskActionResponse {
        let parsed = parse_id(&task_id).and_then(|task_id| {
            build_draft(subtask_title, deadline_epoch_ms, memo, lead_minutes)
                .map(|draft| (task_id, draft))
        });
        let (task_id, draft) = match parsed {
            Ok(parsed) => parsed,
            Err(err) => return TaskActionResponse::failure(format!("add_subtask failed: {err}")),
        };
        self.mutate("add_subtask", |store| {
            let added = store.add_subtask(task_id, draft)?;
            Ok(TaskActionResponse::success("Subtask added.")
                .with_ids(added.task_id, Some(added.subtask_id)))
        })
    }

    /// Replaces subtask title and memo.
    #[flutter_rust_bridge::frb(sync)]
    pub fn update_subtask(
        &self,
        task_id: String,
        subtask_id: String,
        title: String,
        memo: Option<String>,
    ) -> TaskActionResponse {
        let (task_id, subtask_id) = match parse_pair(&task_id, &subtask_id) {
            Ok(ids) => ids,
            Err(err) => return TaskActionResponse::failure(format!("update_subtask failed: {err}")),
        };
        self.mutate("update_subtask", |store| {
            store.update_subtask(task_id, subtask_id, &title, memo.as_deref())?;
            Ok(TaskActionResponse::success("Subtask updated.").with_ids(task_id, Some(subtask_id)))
        })
    }

    /// Replaces a subtask deadline and re-arms its reminder.
    #[flutter_rust_bridge::frb(sync)]
    pub fn set_subtask_deadline(
        &self,
        task_id: String,
        subtask_id: String,
        deadline_epoch_ms: Option<i64>,
        lead_minutes: Option<u32>,
    ) -> TaskActionResponse {
        let parsed = parse_pair(&task_id, &subtask_id)
            .and_then(|ids| parse_lead(lead_minutes).map(|lead| (ids, lead)));
        let ((task_id, subtask_id), lead) = match parsed {
            Ok(parsed) => parsed,
            Err(err) => {
                return TaskActionResponse::failure(format!("set_subtask_deadline failed: {err}"))
            }
        };
        self.mutate("set_subtask_deadline", |store| {
            store.set_subtask_deadline(task_id, subtask_id, deadline_epoch_ms, lead)?;
            Ok(TaskActionResponse::success("Deadline updated.").with_ids(task_id, Some(subtask_id)))
        })
    }

    /// Deletes one subtask; the task goes with it when it was the last one.
    #[flutter_rust_bridge::frb(sync)]
    pub fn delete_subtask(&self, task_id: String, subtask_id: String) -> TaskActionResponse {
        let (task_id, subtask_id) = match parse_pair(&task_id, &subtask_id) {
            Ok(ids) => ids,
            Err(err) => return TaskActionResponse::failure(format!("delete_subtask failed: {err}")),
        };
        self.mutate("delete_subtask", |store| {
            let outcome = store.delete_subtask(task_id, subtask_id)?;
            let message = if outcome.task_removed {
                "Subtask deleted; task removed."
            } else {
                "Subtask deleted."
            };
            let mut response =
                TaskActionResponse::success(message).with_ids(task_id, Some(subtask_id));
            response.task_removed = outcome.task_removed;
            Ok(response)
        })
    }

    /// Deletes a task with all its subtasks.
    #[flutter_rust_bridge::frb(sync)]
    pub fn delete_task(&self, task_id: String) -> TaskActionResponse {
        let task_id = match parse_id(&task_id) {
            Ok(id) => id,
            Err(err) => return TaskActionResponse::failure(format!("delete_task failed: {err}")),
        };
        self.mutate("delete_task", |store| {
            store.delete_task(task_id)?;
            let mut response = TaskActionResponse::success("Task deleted.").with_ids(task_id, None);
            response.task_removed = true;
            Ok(response)
        })
    }

    /// Re-runs consistency validation and queues overdue notifications.
    #[flutter_rust_bridge::frb(sync)]
    pub fn validate(&self) -> ValidationResponse {
        match self.with_store("validate", |store| store.validate()) {
            Ok(report) => ValidationResponse {
                ok: true,
                issues: report.issues.iter().map(ToString::to_string).collect(),
                overdue_count: u32::try_from(report.overdue.len()).unwrap_or(u32::MAX),
                message: if report.is_consistent() {
                    "No issues.".to_string()
                } else {
                    format!("Found {} issue(s).", report.issues.len())
                },
            },
            Err(err) => ValidationResponse {
                ok: false,
                issues: Vec::new(),
                overdue_count: 0,
                message: format!("validate failed: {err}"),
            },
        }
    }

    /// Queues a permission prompt when needed; returns the known state.
    ///
    /// Returns `not_determined|authorized|denied`.
    #[flutter_rust_bridge::frb(sync)]
    pub fn request_notification_authorization(&self) -> String {
        self.with_store("request_notification_authorization", |store| {
            store.request_notification_authorization().as_str()
        })
        .unwrap_or("not_determined")
        .to_string()
    }

    /// Records the user's answer to the OS permission prompt.
    #[flutter_rust_bridge::frb(sync)]
    pub fn set_notification_authorization(&self, granted: bool) {
        let status = if granted {
            AuthorizationStatus::Authorized
        } else {
            AuthorizationStatus::Denied
        };
        // Lock failures are logged by `with_store`.
        let _ = self.with_store("set_notification_authorization", |store| {
            store.notifications_mut().set_authorization(status)
        });
    }

    /// Takes queued notification commands for the host to execute in order.
    #[flutter_rust_bridge::frb(sync)]
    pub fn drain_notification_commands(&self) -> Vec<NotificationCommandItem> {
        self.with_store("drain_notification_commands", |store| {
            store
                .notifications_mut()
                .drain()
                .into_iter()
                .map(to_command_item)
                .collect()
        })
        .unwrap_or_default()
    }

    fn with_store<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut SessionStore) -> T,
    ) -> Result<T, String> {
        let mut store = self.store.lock().map_err(|_| {
            error!("event=session_lock module=ffi status=error operation={operation}");
            "task session is poisoned".to_string()
        })?;
        Ok(f(&mut store))
    }

    fn mutate(
        &self,
        operation: &str,
        f: impl FnOnce(&mut SessionStore) -> taskbell_core::StoreResult<TaskActionResponse>,
    ) -> TaskActionResponse {
        match self.with_store(operation, f) {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => TaskActionResponse::failure(format!("{operation} failed: {err}")),
            Err(err) => TaskActionResponse::failure(format!("{operation} failed: {err}")),
        }
    }
}

fn resolve_db_path(explicit: Option<String>) -> PathBuf {
    let from_env = || std::env::var(DB_PATH_ENV).ok();
    explicit
        .or_else(from_env)
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join(DB_FILE_NAME))
}

fn parse_id(raw: &str) -> Result<Uuid, String> {
    Uuid::parse_str(raw.trim()).map_err(|_| format!("invalid id `{raw}`"))
}

fn parse_pair(task_id: &str, subtask_id: &str) -> Result<(TaskId, SubtaskId), String> {
    Ok((parse_id(task_id)?, parse_id(subtask_id)?))
}

fn parse_lead(lead_minutes: Option<u32>) -> Result<Option<LeadTime>, String> {
    lead_minutes
        .map(|minutes| LeadTime::try_from(minutes).map_err(|err| err.to_string()))
        .transpose()
}

fn build_draft(
    title: String,
    deadline_epoch_ms: Option<i64>,
    memo: Option<String>,
    lead_minutes: Option<u32>,
) -> Result<SubtaskDraft, String> {
    Ok(SubtaskDraft {
        title,
        deadline: deadline_epoch_ms,
        memo,
        lead: parse_lead(lead_minutes)?,
    })
}

fn to_task_item(store: &SessionStore, task: &Task) -> TaskItem {
    TaskItem {
        task_id: task.id.to_string(),
        title: task.title.clone(),
        subtasks: task
            .subtasks
            .iter()
            .map(|subtask| SubtaskItem {
                subtask_id: subtask.id.to_string(),
                title: subtask.title.clone(),
                deadline_epoch_ms: subtask.deadline,
                memo: subtask.memo.clone(),
                pending_reminders: u32::try_from(
                    store.reminders().for_subtask(subtask.id).len(),
                )
                .unwrap_or(u32::MAX),
            })
            .collect(),
    }
}

fn to_command_item(command: NotificationCommand) -> NotificationCommandItem {
    match command {
        NotificationCommand::RequestAuthorization => NotificationCommandItem {
            kind: "request_authorization".to_string(),
            reminder_ids: Vec::new(),
            title: None,
            body: None,
            trigger_epoch_ms: None,
        },
        NotificationCommand::Schedule(request) => NotificationCommandItem {
            kind: "schedule".to_string(),
            reminder_ids: vec![request.id.to_string()],
            title: Some(request.title),
            body: Some(request.body),
            trigger_epoch_ms: match request.trigger {
                Trigger::At(epoch_ms) => Some(epoch_ms),
                Trigger::Immediate => None,
            },
        },
        NotificationCommand::Cancel(ids) => NotificationCommandItem {
            kind: "cancel".to_string(),
            reminder_ids: ids.iter().map(ToString::to_string).collect(),
            title: None,
            body: None,
            trigger_epoch_ms: None,
        },
    }
}
