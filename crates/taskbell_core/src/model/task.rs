//! Task and subtask domain model.
//!
//! # Responsibility
//! - Define the records persisted as the task collection blob.
//! - Normalize and bound user-entered titles and memos.
//!
//! # Invariants
//! - `id` is stable and never reused for another entity.
//! - Titles are trimmed, whitespace-collapsed and 1..=`MAX_TITLE_CHARS` long.
//! - Absent optional fields are omitted from the wire form, never `null`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a task.
pub type TaskId = Uuid;

/// Stable identifier for a subtask.
pub type SubtaskId = Uuid;

/// Upper bound for task and subtask titles, in characters.
pub const MAX_TITLE_CHARS: usize = 100;

/// Upper bound for subtask memos, in characters.
pub const MAX_MEMO_CHARS: usize = 2000;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Validation errors for user-entered model fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    /// Title is blank after normalization.
    EmptyTitle,
    /// Title exceeds `MAX_TITLE_CHARS`.
    TitleTooLong { chars: usize },
    /// Memo exceeds `MAX_MEMO_CHARS`.
    MemoTooLong { chars: usize },
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "title must not be blank"),
            Self::TitleTooLong { chars } => write!(
                f,
                "title has {chars} characters; at most {MAX_TITLE_CHARS} allowed"
            ),
            Self::MemoTooLong { chars } => write!(
                f,
                "memo has {chars} characters; at most {MAX_MEMO_CHARS} allowed"
            ),
        }
    }
}

impl Error for ModelValidationError {}

/// Leaf work item owned by exactly one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: SubtaskId,
    pub title: String,
    /// Unix epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl Subtask {
    /// Creates a subtask with a generated id.
    ///
    /// The title is normalized; the memo is normalized to `None` when blank.
    pub fn new(
        title: &str,
        deadline: Option<i64>,
        memo: Option<&str>,
    ) -> Result<Self, ModelValidationError> {
        Ok(Self {
            id: Uuid::new_v4(),
            title: normalize_title(title)?,
            deadline,
            memo: normalize_memo(memo)?,
        })
    }

    /// Identity comparison, ignoring mutable fields.
    pub fn same_entity(&self, other: &Self) -> bool {
        self.id == other.id
    }

    /// Returns whether the deadline has been reached at `now_ms`.
    pub fn is_overdue_at(&self, now_ms: i64) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now_ms)
    }
}

/// Named container of one or more subtasks.
///
/// `subtasks` order is the display/priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub subtasks: Vec<Subtask>,
}

impl Task {
    /// Creates a task with a generated id owning `first_subtask`.
    pub fn new(title: &str, first_subtask: Subtask) -> Result<Self, ModelValidationError> {
        Ok(Self {
            id: Uuid::new_v4(),
            title: normalize_title(title)?,
            subtasks: vec![first_subtask],
        })
    }

    /// Identity comparison, ignoring mutable fields.
    pub fn same_entity(&self, other: &Self) -> bool {
        self.id == other.id
    }

    pub fn subtask(&self, subtask_id: SubtaskId) -> Option<&Subtask> {
        self.subtasks.iter().find(|subtask| subtask.id == subtask_id)
    }

    /// Removes and returns one subtask by id.
    pub fn remove_subtask(&mut self, subtask_id: SubtaskId) -> Option<Subtask> {
        let index = self
            .subtasks
            .iter()
            .position(|subtask| subtask.id == subtask_id)?;
        Some(self.subtasks.remove(index))
    }
}

/// Trims, collapses inner whitespace and bounds a title.
pub fn normalize_title(raw: &str) -> Result<String, ModelValidationError> {
    let collapsed = WHITESPACE_RE.replace_all(raw.trim(), " ").into_owned();
    if collapsed.is_empty() {
        return Err(ModelValidationError::EmptyTitle);
    }
    let chars = collapsed.chars().count();
    if chars > MAX_TITLE_CHARS {
        return Err(ModelValidationError::TitleTooLong { chars });
    }
    Ok(collapsed)
}

/// Trims and bounds a memo; blank memos become `None`.
///
/// Inner line breaks are preserved.
pub fn normalize_memo(raw: Option<&str>) -> Result<Option<String>, ModelValidationError> {
    let Some(trimmed) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    let chars = trimmed.chars().count();
    if chars > MAX_MEMO_CHARS {
        return Err(ModelValidationError::MemoTooLong { chars });
    }
    Ok(Some(trimmed.to_string()))
}
