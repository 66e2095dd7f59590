//! Queue-backed notification adapter.
//!
//! Core pushes commands; the host (Flutter side) drains them and executes
//! them against the real OS notification API, then reports permission
//! decisions back through `set_authorization`.

use super::{
    AuthorizationStatus, NotificationCenter, NotificationError, NotificationRequest, ReminderId,
    Trigger,
};
use std::collections::BTreeMap;

/// Instruction for the host notification platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationCommand {
    RequestAuthorization,
    Schedule(NotificationRequest),
    Cancel(Vec<ReminderId>),
}

/// Notification center that buffers commands for the host.
#[derive(Debug, Default)]
pub struct QueuedNotificationCenter {
    status: AuthorizationStatus,
    commands: Vec<NotificationCommand>,
    pending: BTreeMap<ReminderId, NotificationRequest>,
}

impl QueuedNotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a center whose permission state is already known.
    pub fn with_authorization(status: AuthorizationStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Records the permission decision reported by the host.
    pub fn set_authorization(&mut self, status: AuthorizationStatus) {
        self.status = status;
    }

    /// Takes all buffered commands in issue order.
    pub fn drain(&mut self) -> Vec<NotificationCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Returns buffered commands without consuming them.
    pub fn commands(&self) -> &[NotificationCommand] {
        &self.commands
    }

    /// Timed requests not yet due or cancelled, ordered by id.
    ///
    /// Immediate requests are delivered on drain and never tracked here.
    pub fn pending(&self) -> impl Iterator<Item = &NotificationRequest> {
        self.pending.values()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl NotificationCenter for QueuedNotificationCenter {
    fn authorization(&self) -> AuthorizationStatus {
        self.status
    }

    fn request_authorization(&mut self) -> AuthorizationStatus {
        if self.status == AuthorizationStatus::NotDetermined {
            self.commands.push(NotificationCommand::RequestAuthorization);
        }
        self.status
    }

    fn register(&mut self, request: &NotificationRequest) -> Result<(), NotificationError> {
        if self.status == AuthorizationStatus::Denied {
            return Err(NotificationError::NotAuthorized);
        }
        if let Trigger::At(_) = request.trigger {
            self.pending.insert(request.id, request.clone());
        }
        self.commands
            .push(NotificationCommand::Schedule(request.clone()));
        Ok(())
    }

    fn cancel(&mut self, ids: &[ReminderId]) {
        if ids.is_empty() {
            return;
        }
        for id in ids {
            self.pending.remove(id);
        }
        self.commands.push(NotificationCommand::Cancel(ids.to_vec()));
    }

    fn forget_delivered(&mut self, now_ms: i64) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, request| match request.trigger {
            Trigger::At(at) => at > now_ms,
            Trigger::Immediate => false,
        });
        before - self.pending.len()
    }
}
