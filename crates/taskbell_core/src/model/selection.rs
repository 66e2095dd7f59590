//! UI selection state as an explicit tagged variant.

use crate::model::task::{SubtaskId, TaskId};

/// Location of one subtask inside the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubtaskRef {
    pub task_id: TaskId,
    pub subtask_id: SubtaskId,
}

/// Currently selected subtask, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    None,
    Selected(SubtaskRef),
}

impl Selection {
    pub fn selected(self) -> Option<SubtaskRef> {
        match self {
            Self::None => None,
            Self::Selected(target) => Some(target),
        }
    }

    /// Returns whether the selection points into `task_id`.
    pub fn is_in_task(self, task_id: TaskId) -> bool {
        matches!(self, Self::Selected(target) if target.task_id == task_id)
    }

    /// Returns whether the selection points at `subtask_id`.
    pub fn is_subtask(self, subtask_id: SubtaskId) -> bool {
        matches!(self, Self::Selected(target) if target.subtask_id == subtask_id)
    }
}
