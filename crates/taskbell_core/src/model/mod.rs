//! Domain model for tasks, subtasks and reminder lead times.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep wire shape stable for the persisted task collection.
//!
//! # Invariants
//! - Every task and subtask is identified by a stable UUID.
//! - A stored task always owns at least one subtask.

pub mod lead_time;
pub mod selection;
pub mod task;
