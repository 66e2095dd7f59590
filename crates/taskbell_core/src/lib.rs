//! Core domain logic for Taskbell.
//! This crate is the single source of truth for task and reminder invariants.

pub mod clock;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;
pub mod service;

pub use clock::{Clock, SystemClock};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::lead_time::{LeadTime, UnsupportedLeadTime};
pub use model::selection::{Selection, SubtaskRef};
pub use model::task::{
    ModelValidationError, Subtask, SubtaskId, Task, TaskId, MAX_MEMO_CHARS, MAX_TITLE_CHARS,
};
pub use notify::{
    AuthorizationStatus, NotificationCenter, NotificationCommand, NotificationError,
    NotificationRequest, QueuedNotificationCenter, ReminderId, ReminderKind, Trigger,
};
pub use repo::kv_repo::{KvRepository, RepoError, RepoResult, SqliteKvRepository};
pub use service::persistence::{LoadStatus, Loaded, TaskPersistence, REMINDERS_KEY, TASKS_KEY};
pub use service::reminder_scheduler::{
    trigger_at, PendingReminder, ReminderRegistry, ReminderScheduler,
};
pub use service::task_store::{
    AddedSubtask, DeleteOutcome, StoreResult, SubscriptionId, SubtaskDraft, TaskObserver,
    TaskStore, TaskStoreError,
};
pub use service::validator::{validate_collection, ConsistencyIssue, ValidationReport};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
