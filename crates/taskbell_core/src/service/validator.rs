//! Structural consistency checks over a loaded task collection.
//!
//! # Responsibility
//! - Detect ownership corruption between tasks and subtasks.
//! - Detect subtask references (pending reminders) with no owning task.
//! - Collect subtasks whose deadline has passed.
//!
//! # Invariants
//! - Validation never mutates or repairs its input.
//! - Exactly one `OrphanedSubtask` record per orphaned subtask id.

use crate::model::selection::SubtaskRef;
use crate::model::task::{SubtaskId, Task, TaskId};
use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};

/// One structural violation found by validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyIssue {
    /// Task id appears more than once in the collection.
    DuplicateTaskId { task_id: TaskId, task_title: String },
    /// Subtask id repeated inside one task.
    DuplicateSubtaskInTask {
        task_id: TaskId,
        task_title: String,
        subtask_id: SubtaskId,
        subtask_title: String,
    },
    /// Subtask id already owned by another task; `task_*` names the extra owner.
    SubtaskInMultipleTasks {
        task_id: TaskId,
        task_title: String,
        subtask_id: SubtaskId,
        subtask_title: String,
    },
    /// Task owns no subtasks.
    EmptyTask { task_id: TaskId, task_title: String },
    /// Subtask referenced elsewhere but owned by no task.
    OrphanedSubtask {
        subtask_id: SubtaskId,
        subtask_title: String,
    },
}

impl ConsistencyIssue {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateTaskId { .. } => "duplicate_task_id",
            Self::DuplicateSubtaskInTask { .. } => "duplicate_subtask_in_task",
            Self::SubtaskInMultipleTasks { .. } => "subtask_in_multiple_tasks",
            Self::EmptyTask { .. } => "empty_task",
            Self::OrphanedSubtask { .. } => "orphaned_subtask",
        }
    }

    /// Id of the subtask involved, if any.
    pub fn subtask_id(&self) -> Option<SubtaskId> {
        match self {
            Self::DuplicateSubtaskInTask { subtask_id, .. }
            | Self::SubtaskInMultipleTasks { subtask_id, .. }
            | Self::OrphanedSubtask { subtask_id, .. } => Some(*subtask_id),
            Self::DuplicateTaskId { .. } | Self::EmptyTask { .. } => None,
        }
    }

    /// Id of the task involved, if any.
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::DuplicateTaskId { task_id, .. }
            | Self::DuplicateSubtaskInTask { task_id, .. }
            | Self::SubtaskInMultipleTasks { task_id, .. }
            | Self::EmptyTask { task_id, .. } => Some(*task_id),
            Self::OrphanedSubtask { .. } => None,
        }
    }
}

impl Display for ConsistencyIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateTaskId { task_title, .. } => {
                write!(f, "task `{task_title}` appears more than once")
            }
            Self::DuplicateSubtaskInTask {
                task_title,
                subtask_title,
                ..
            } => write!(
                f,
                "subtask `{subtask_title}` is listed twice in task `{task_title}`"
            ),
            Self::SubtaskInMultipleTasks {
                task_title,
                subtask_title,
                ..
            } => write!(
                f,
                "subtask `{subtask_title}` in task `{task_title}` is also owned by another task"
            ),
            Self::EmptyTask { task_title, .. } => {
                write!(f, "task `{task_title}` has no subtasks")
            }
            Self::OrphanedSubtask { subtask_title, .. } => {
                write!(f, "subtask `{subtask_title}` is not owned by any task")
            }
        }
    }
}

/// Outcome of one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<ConsistencyIssue>,
    /// Subtasks whose deadline is at or before validation time.
    pub overdue: Vec<SubtaskRef>,
}

impl ValidationReport {
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Validates `tasks` against each other and against `external_refs`.
///
/// `external_refs` are `(subtask id, last known title)` pairs held outside
/// the collection, e.g. by the reminder registry. Repeated ids are reported
/// once.
pub fn validate_collection<'a>(
    tasks: &[Task],
    external_refs: impl IntoIterator<Item = (SubtaskId, &'a str)>,
    now_ms: i64,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut seen_tasks = HashSet::new();
    let mut owners: HashMap<SubtaskId, TaskId> = HashMap::new();

    for task in tasks {
        if !seen_tasks.insert(task.id) {
            report.issues.push(ConsistencyIssue::DuplicateTaskId {
                task_id: task.id,
                task_title: task.title.clone(),
            });
            continue;
        }

        if task.subtasks.is_empty() {
            report.issues.push(ConsistencyIssue::EmptyTask {
                task_id: task.id,
                task_title: task.title.clone(),
            });
        }

        let mut in_task = HashSet::new();
        for subtask in &task.subtasks {
            if !in_task.insert(subtask.id) {
                report.issues.push(ConsistencyIssue::DuplicateSubtaskInTask {
                    task_id: task.id,
                    task_title: task.title.clone(),
                    subtask_id: subtask.id,
                    subtask_title: subtask.title.clone(),
                });
                continue;
            }
            if owners.contains_key(&subtask.id) {
                report.issues.push(ConsistencyIssue::SubtaskInMultipleTasks {
                    task_id: task.id,
                    task_title: task.title.clone(),
                    subtask_id: subtask.id,
                    subtask_title: subtask.title.clone(),
                });
                continue;
            }
            owners.insert(subtask.id, task.id);

            if subtask.is_overdue_at(now_ms) {
                report.overdue.push(SubtaskRef {
                    task_id: task.id,
                    subtask_id: subtask.id,
                });
            }
        }
    }

    let mut reported_orphans = HashSet::new();
    for (subtask_id, subtask_title) in external_refs {
        if owners.contains_key(&subtask_id) || !reported_orphans.insert(subtask_id) {
            continue;
        }
        report.issues.push(ConsistencyIssue::OrphanedSubtask {
            subtask_id,
            subtask_title: subtask_title.to_string(),
        });
    }

    for issue in &report.issues {
        warn!(
            "event=validate module=validator status=error error_code={} task_id={} subtask_id={}",
            issue.code(),
            issue
                .task_id()
                .map_or_else(|| "-".to_string(), |id| id.to_string()),
            issue
                .subtask_id()
                .map_or_else(|| "-".to_string(), |id| id.to_string()),
        );
    }
    info!(
        "event=validate module=validator status=ok tasks={} issues={} overdue={}",
        tasks.len(),
        report.issues.len(),
        report.overdue.len()
    );
    report
}
