//! Reminder scheduling and per-subtask reminder registry.
//!
//! # Responsibility
//! - Convert `(deadline, lead time)` pairs into platform trigger times.
//! - Track every pending reminder id per subtask so deletes and deadline
//!   changes can withdraw them.
//! - Emit immediate overdue notifications.
//!
//! # Invariants
//! - Trigger time is exactly `deadline - lead`.
//! - A registry entry exists only for requests the platform accepted.
//! - Repeated scheduling is not deduplicated; callers cancel first.
//! - Overdue notifications never enter the registry.

use crate::model::lead_time::LeadTime;
use crate::model::task::{Subtask, SubtaskId};
use crate::notify::{
    AuthorizationStatus, NotificationCenter, NotificationRequest, ReminderId, ReminderKind,
    Trigger,
};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Computes the trigger time for a reminder `lead` before `deadline_ms`.
pub fn trigger_at(deadline_ms: i64, lead: LeadTime) -> i64 {
    deadline_ms.saturating_sub(lead.as_millis())
}

/// One lead-time reminder accepted by the platform and not yet withdrawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReminder {
    pub id: ReminderId,
    pub subtask_id: SubtaskId,
    /// Title at scheduling time; used for diagnostics on orphaned entries.
    pub subtask_title: String,
    pub lead: LeadTime,
    /// Unix epoch milliseconds.
    pub trigger_at: i64,
}

/// Subtask id -> pending reminders, in scheduling order.
///
/// Persisted as a flat list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PendingReminder>", into = "Vec<PendingReminder>")]
pub struct ReminderRegistry {
    by_subtask: BTreeMap<SubtaskId, Vec<PendingReminder>>,
}

impl ReminderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reminder: PendingReminder) {
        self.by_subtask
            .entry(reminder.subtask_id)
            .or_default()
            .push(reminder);
    }

    /// Pending reminders for one subtask.
    pub fn for_subtask(&self, subtask_id: SubtaskId) -> &[PendingReminder] {
        self.by_subtask
            .get(&subtask_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Removes and returns every reminder of one subtask.
    pub fn take_for(&mut self, subtask_id: SubtaskId) -> Vec<PendingReminder> {
        self.by_subtask.remove(&subtask_id).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingReminder> {
        self.by_subtask.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_subtask.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_subtask.is_empty()
    }

    /// Drops reminders whose trigger is at or before `now_ms`.
    ///
    /// Entries of subtasks rejected by `is_owned` are kept so they stay
    /// visible to consistency checks. Returns how many were dropped.
    pub fn prune_fired(&mut self, now_ms: i64, is_owned: impl Fn(SubtaskId) -> bool) -> usize {
        let before = self.len();
        self.by_subtask.retain(|subtask_id, reminders| {
            if is_owned(*subtask_id) {
                reminders.retain(|reminder| reminder.trigger_at > now_ms);
            }
            !reminders.is_empty()
        });
        before - self.len()
    }
}

impl From<Vec<PendingReminder>> for ReminderRegistry {
    fn from(value: Vec<PendingReminder>) -> Self {
        let mut registry = Self::new();
        for reminder in value {
            registry.insert(reminder);
        }
        registry
    }
}

impl From<ReminderRegistry> for Vec<PendingReminder> {
    fn from(value: ReminderRegistry) -> Self {
        value.by_subtask.into_values().flatten().collect()
    }
}

/// Schedules and withdraws reminders against a notification platform.
pub struct ReminderScheduler<N: NotificationCenter> {
    center: N,
    registry: ReminderRegistry,
}

impl<N: NotificationCenter> ReminderScheduler<N> {
    /// Creates a scheduler resuming from a previously persisted registry.
    pub fn new(center: N, registry: ReminderRegistry) -> Self {
        Self { center, registry }
    }

    pub fn registry(&self) -> &ReminderRegistry {
        &self.registry
    }

    pub fn center(&self) -> &N {
        &self.center
    }

    pub fn center_mut(&mut self) -> &mut N {
        &mut self.center
    }

    pub fn authorization(&self) -> AuthorizationStatus {
        self.center.authorization()
    }

    /// Asks the platform for notification permission.
    pub fn request_authorization(&mut self) -> AuthorizationStatus {
        let status = self.center.request_authorization();
        info!(
            "event=notify_authorization module=scheduler status=ok authorization={}",
            status.as_str()
        );
        status
    }

    /// Registers one reminder at `deadline - lead`.
    ///
    /// Returns `None` when the subtask has no deadline, permission was denied
    /// or the platform rejected the request. None of these are fatal.
    pub fn schedule(
        &mut self,
        subtask: &Subtask,
        lead: LeadTime,
        now_ms: i64,
    ) -> Option<PendingReminder> {
        let Some(deadline) = subtask.deadline else {
            debug!(
                "event=reminder_schedule module=scheduler status=skipped reason=no_deadline subtask_id={}",
                subtask.id
            );
            return None;
        };

        if self.center.authorization() == AuthorizationStatus::Denied {
            warn!(
                "event=reminder_schedule module=scheduler status=skipped reason=not_authorized subtask_id={}",
                subtask.id
            );
            return None;
        }

        let trigger = trigger_at(deadline, lead);
        if trigger <= now_ms {
            // The platform decides whether to fire immediately or drop it.
            debug!(
                "event=reminder_schedule module=scheduler status=start reason=trigger_in_past subtask_id={} trigger_at={}",
                subtask.id, trigger
            );
        }

        let request = NotificationRequest {
            id: Uuid::new_v4(),
            subtask_id: subtask.id,
            kind: ReminderKind::LeadTime(lead),
            title: subtask.title.clone(),
            body: format!("Due in {}", lead.label()),
            trigger: Trigger::At(trigger),
        };

        if let Err(err) = self.center.register(&request) {
            error!(
                "event=reminder_schedule module=scheduler status=error subtask_id={} reminder_id={} error={}",
                subtask.id, request.id, err
            );
            return None;
        }

        let reminder = PendingReminder {
            id: request.id,
            subtask_id: subtask.id,
            subtask_title: subtask.title.clone(),
            lead,
            trigger_at: trigger,
        };
        self.registry.insert(reminder.clone());
        info!(
            "event=reminder_schedule module=scheduler status=ok subtask_id={} reminder_id={} lead_minutes={} trigger_at={}",
            subtask.id,
            reminder.id,
            lead.minutes(),
            trigger
        );
        Some(reminder)
    }

    /// Withdraws every pending reminder of one subtask.
    ///
    /// Returns how many reminders were cancelled.
    pub fn cancel_all(&mut self, subtask_id: SubtaskId) -> usize {
        let reminders = self.registry.take_for(subtask_id);
        if reminders.is_empty() {
            return 0;
        }
        let ids = reminders
            .iter()
            .map(|reminder| reminder.id)
            .collect::<Vec<_>>();
        self.center.cancel(&ids);
        info!(
            "event=reminder_cancel module=scheduler status=ok subtask_id={} cancelled={}",
            subtask_id,
            ids.len()
        );
        ids.len()
    }

    /// Emits an immediate overdue notification for one subtask.
    ///
    /// Skipped when permission was denied.
    pub fn notify_overdue(&mut self, subtask: &Subtask) -> Option<ReminderId> {
        if self.center.authorization() == AuthorizationStatus::Denied {
            warn!(
                "event=overdue_notify module=scheduler status=skipped reason=not_authorized subtask_id={}",
                subtask.id
            );
            return None;
        }

        let request = NotificationRequest {
            id: Uuid::new_v4(),
            subtask_id: subtask.id,
            kind: ReminderKind::Overdue,
            title: subtask.title.clone(),
            body: "Deadline has passed".to_string(),
            trigger: Trigger::Immediate,
        };
        match self.center.register(&request) {
            Ok(()) => {
                info!(
                    "event=overdue_notify module=scheduler status=ok subtask_id={} reminder_id={}",
                    subtask.id, request.id
                );
                Some(request.id)
            }
            Err(err) => {
                error!(
                    "event=overdue_notify module=scheduler status=error subtask_id={} error={}",
                    subtask.id, err
                );
                None
            }
        }
    }

    /// Drops fired reminders of owned subtasks from the registry and the
    /// platform bookkeeping.
    ///
    /// Returns how many registry entries were dropped.
    pub fn prune_fired(&mut self, now_ms: i64, is_owned: impl Fn(SubtaskId) -> bool) -> usize {
        let pruned = self.registry.prune_fired(now_ms, is_owned);
        let forgotten = self.center.forget_delivered(now_ms);
        if pruned > 0 || forgotten > 0 {
            debug!(
                "event=reminder_prune module=scheduler status=ok pruned={} forgotten={}",
                pruned, forgotten
            );
        }
        pruned
    }
}
