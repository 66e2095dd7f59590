//! Notification platform port.
//!
//! # Responsibility
//! - Describe the requests core hands to the host notification platform.
//! - Provide a queue-backed adapter the host drains and executes.
//!
//! # Invariants
//! - Every request carries a unique `ReminderId`.
//! - Core never blocks on the platform; failures come back as errors only.

pub mod queue;

use crate::model::lead_time::LeadTime;
use crate::model::task::SubtaskId;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub use queue::{NotificationCommand, QueuedNotificationCenter};

/// Stable identifier for one platform notification request.
pub type ReminderId = Uuid;

/// User's notification permission as known by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthorizationStatus {
    /// User has not been asked yet.
    #[default]
    NotDetermined,
    Authorized,
    /// User declined; the host should offer a settings redirect.
    Denied,
}

impl AuthorizationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotDetermined => "not_determined",
            Self::Authorized => "authorized",
            Self::Denied => "denied",
        }
    }
}

/// When the platform should display a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Unix epoch milliseconds.
    At(i64),
    Immediate,
}

/// Why a notification was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderKind {
    LeadTime(LeadTime),
    Overdue,
}

/// One titled message to display at a trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub id: ReminderId,
    pub subtask_id: SubtaskId,
    pub kind: ReminderKind,
    pub title: String,
    pub body: String,
    pub trigger: Trigger,
}

/// Platform rejection of a notification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// User has denied notification permission.
    NotAuthorized,
    /// Platform refused the request for another reason.
    Rejected(String),
}

impl Display for NotificationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAuthorized => write!(f, "notification permission not granted"),
            Self::Rejected(reason) => write!(f, "notification request rejected: {reason}"),
        }
    }
}

impl Error for NotificationError {}

/// Host notification platform.
pub trait NotificationCenter {
    /// Returns the last known permission state.
    fn authorization(&self) -> AuthorizationStatus;
    /// Asks for permission; returns the state known right after asking.
    fn request_authorization(&mut self) -> AuthorizationStatus;
    /// Registers one request for delivery.
    fn register(&mut self, request: &NotificationRequest) -> Result<(), NotificationError>;
    /// Withdraws pending requests. Unknown ids are ignored.
    fn cancel(&mut self, ids: &[ReminderId]);
    /// Drops bookkeeping for timed requests due at or before `now_ms`.
    ///
    /// Returns how many were dropped. Platforms without bookkeeping keep
    /// the default.
    fn forget_delivered(&mut self, _now_ms: i64) -> usize {
        0
    }
}
