use std::path::Path;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use taskbell_core::db::{open_db, open_db_in_memory};
use taskbell_core::{
    AuthorizationStatus, Clock, KvRepository, LeadTime, LoadStatus, NotificationCommand,
    QueuedNotificationCenter, ReminderKind, RepoError, RepoResult, Selection, SqliteKvRepository,
    SubtaskDraft, SubtaskRef, TaskStore, TaskStoreError, Trigger, TASKS_KEY,
};

const NOW: i64 = 1_800_000_000_000;
const MINUTE: i64 = 60 * 1000;
const HOUR: i64 = 60 * MINUTE;

struct ManualClock(AtomicI64);

impl ManualClock {
    fn at(now_ms: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(now_ms)))
    }

    fn set(&self, now_ms: i64) {
        self.0.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

struct FailingRepo;

impl KvRepository for FailingRepo {
    fn get(&self, _key: &str) -> RepoResult<Option<String>> {
        Err(RepoError::MissingRequiredTable("kv_entries"))
    }

    fn put(&self, _key: &str, _value: &str) -> RepoResult<()> {
        Err(RepoError::MissingRequiredTable("kv_entries"))
    }

    fn remove(&self, _key: &str) -> RepoResult<()> {
        Err(RepoError::MissingRequiredTable("kv_entries"))
    }
}

type SqliteStore = TaskStore<SqliteKvRepository, QueuedNotificationCenter>;

fn authorized() -> QueuedNotificationCenter {
    QueuedNotificationCenter::with_authorization(AuthorizationStatus::Authorized)
}

fn memory_store() -> SqliteStore {
    let repo = SqliteKvRepository::try_new(open_db_in_memory().unwrap()).unwrap();
    TaskStore::open(repo, authorized(), ManualClock::at(NOW))
}

fn file_store(path: &Path, clock: Arc<ManualClock>) -> SqliteStore {
    let repo = SqliteKvRepository::try_new(open_db(path).unwrap()).unwrap();
    TaskStore::open(repo, authorized(), clock)
}

fn milk_due_in_an_hour() -> SubtaskDraft {
    SubtaskDraft::new("Buy milk").with_deadline(NOW + HOUR, Some(LeadTime::ThirtyMinutes))
}

#[test]
fn empty_store_opens_without_warnings() {
    let store = memory_store();

    assert!(store.tasks().is_empty());
    assert_eq!(store.load_status(), &LoadStatus::Empty);
    assert!(store.startup_report().is_consistent());
    assert!(store.startup_report().overdue.is_empty());
    assert!(store.notifications().commands().is_empty());
}

#[test]
fn groceries_scenario_schedules_then_cascades_and_cancels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskbell.db");
    let clock = ManualClock::at(NOW);
    let mut store = file_store(&path, clock.clone());

    let added = store.add_task("Groceries", milk_due_in_an_hour()).unwrap();
    let reminder_id = added.reminder.expect("reminder should be scheduled");

    assert_eq!(store.tasks().len(), 1);
    assert_eq!(store.tasks()[0].subtasks.len(), 1);
    let pending = store.notifications().pending().collect::<Vec<_>>();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, reminder_id);
    assert_eq!(pending[0].trigger, Trigger::At(NOW + 30 * MINUTE));
    assert_eq!(
        pending[0].kind,
        ReminderKind::LeadTime(LeadTime::ThirtyMinutes)
    );

    let persisted = file_store(&path, clock.clone());
    assert_eq!(persisted.tasks(), store.tasks());
    drop(persisted);

    let outcome = store
        .delete_subtask(added.task_id, added.subtask_id)
        .unwrap();
    assert!(outcome.task_removed);
    assert_eq!(outcome.cancelled_reminders, 1);
    assert!(store.tasks().is_empty());
    assert_eq!(store.notifications().pending_len(), 0);
    assert_eq!(
        store.notifications().commands().last(),
        Some(&NotificationCommand::Cancel(vec![reminder_id]))
    );

    let reopened = file_store(&path, clock);
    assert!(reopened.tasks().is_empty());
    assert!(reopened.reminders().is_empty());
}

#[test]
fn deleting_non_last_subtask_keeps_task() {
    let mut store = memory_store();
    let first = store.add_task("Trip", SubtaskDraft::new("Book hotel")).unwrap();
    let second = store
        .add_subtask(first.task_id, SubtaskDraft::new("Pack"))
        .unwrap();

    let outcome = store
        .delete_subtask(first.task_id, first.subtask_id)
        .unwrap();
    assert!(!outcome.task_removed);
    assert_eq!(outcome.cancelled_reminders, 0);
    let task = store.task(first.task_id).unwrap();
    assert_eq!(task.subtasks.len(), 1);
    assert_eq!(task.subtasks[0].id, second.subtask_id);

    let outcome = store
        .delete_subtask(first.task_id, second.subtask_id)
        .unwrap();
    assert!(outcome.task_removed);
    assert!(store.task(first.task_id).is_none());
    assert!(store.tasks().iter().all(|task| !task.subtasks.is_empty()));
}

#[test]
fn delete_task_cancels_reminders_of_every_subtask() {
    let mut store = memory_store();
    let added = store.add_task("Launch", milk_due_in_an_hour()).unwrap();
    store
        .add_subtask(
            added.task_id,
            SubtaskDraft::new("Announce").with_deadline(NOW + 3 * HOUR, Some(LeadTime::TwoHours)),
        )
        .unwrap();
    assert_eq!(store.reminders().len(), 2);

    let outcome = store.delete_task(added.task_id).unwrap();
    assert_eq!(outcome.cancelled_reminders, 2);
    assert!(store.tasks().is_empty());
    assert!(store.reminders().is_empty());
    assert_eq!(store.notifications().pending_len(), 0);
}

#[test]
fn update_subtask_edits_in_place_without_rescheduling() {
    let mut store = memory_store();
    let added = store.add_task("Groceries", milk_due_in_an_hour()).unwrap();
    let commands_before = store.notifications().commands().len();

    store
        .update_subtask(added.task_id, added.subtask_id, "  Buy  oat milk ", Some("barista"))
        .unwrap();

    let subtask = store.subtask(added.task_id, added.subtask_id).unwrap();
    assert_eq!(subtask.title, "Buy oat milk");
    assert_eq!(subtask.memo.as_deref(), Some("barista"));
    assert_eq!(subtask.deadline, Some(NOW + HOUR));
    assert_eq!(store.notifications().commands().len(), commands_before);
    assert_eq!(store.reminders().len(), 1);
}

#[test]
fn invalid_input_leaves_state_untouched() {
    let mut store = memory_store();
    let added = store.add_task("Groceries", SubtaskDraft::new("Buy milk")).unwrap();
    let revision = store.revision();

    let err = store
        .update_subtask(added.task_id, added.subtask_id, "   ", None)
        .unwrap_err();
    assert!(matches!(err, TaskStoreError::InvalidInput(_)));
    assert!(store.add_task("", SubtaskDraft::new("x")).is_err());
    assert!(store
        .add_task("Fine", SubtaskDraft::new("y".repeat(101)))
        .is_err());

    assert_eq!(store.revision(), revision);
    assert_eq!(store.tasks().len(), 1);
    assert_eq!(
        store.subtask(added.task_id, added.subtask_id).unwrap().title,
        "Buy milk"
    );
}

#[test]
fn unknown_ids_are_reported() {
    let mut store = memory_store();
    let added = store.add_task("Groceries", SubtaskDraft::new("Buy milk")).unwrap();
    let missing = uuid::Uuid::new_v4();

    assert_eq!(
        store.delete_task(missing).unwrap_err(),
        TaskStoreError::TaskNotFound(missing)
    );
    assert_eq!(
        store.delete_subtask(added.task_id, missing).unwrap_err(),
        TaskStoreError::SubtaskNotFound {
            task_id: added.task_id,
            subtask_id: missing,
        }
    );
    assert!(store.add_subtask(missing, SubtaskDraft::new("x")).is_err());
}

#[test]
fn deadline_change_cancels_then_reschedules() {
    let mut store = memory_store();
    let added = store.add_task("Groceries", milk_due_in_an_hour()).unwrap();
    let old_reminder = added.reminder.unwrap();

    let new_reminder = store
        .set_subtask_deadline(
            added.task_id,
            added.subtask_id,
            Some(NOW + 2 * HOUR),
            Some(LeadTime::FifteenMinutes),
        )
        .unwrap()
        .expect("new reminder");

    let pending = store.notifications().pending().collect::<Vec<_>>();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, new_reminder);
    assert_eq!(pending[0].trigger, Trigger::At(NOW + 2 * HOUR - 15 * MINUTE));
    assert!(store
        .notifications()
        .commands()
        .contains(&NotificationCommand::Cancel(vec![old_reminder])));

    let cleared = store
        .set_subtask_deadline(added.task_id, added.subtask_id, None, None)
        .unwrap();
    assert_eq!(cleared, None);
    assert_eq!(store.notifications().pending_len(), 0);
    assert_eq!(
        store.subtask(added.task_id, added.subtask_id).unwrap().deadline,
        None
    );
}

#[test]
fn reminders_registered_by_previous_process_are_cancelled_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskbell.db");
    let clock = ManualClock::at(NOW);

    let added = {
        let mut store = file_store(&path, clock.clone());
        store.add_task("Groceries", milk_due_in_an_hour()).unwrap()
    };

    let mut store = file_store(&path, clock);
    assert_eq!(store.reminders().for_subtask(added.subtask_id).len(), 1);
    let outcome = store
        .delete_subtask(added.task_id, added.subtask_id)
        .unwrap();
    assert_eq!(outcome.cancelled_reminders, 1);
    assert_eq!(
        store.notifications().commands().last(),
        Some(&NotificationCommand::Cancel(vec![added.reminder.unwrap()]))
    );
}

#[test]
fn open_emits_overdue_notifications_and_prunes_fired_reminders() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskbell.db");
    let clock = ManualClock::at(NOW);

    let added = {
        let mut store = file_store(&path, clock.clone());
        store.add_task("Groceries", milk_due_in_an_hour()).unwrap()
    };

    clock.set(NOW + 2 * HOUR);
    let store = file_store(&path, clock);
    assert!(store.reminders().is_empty());
    assert!(store.startup_report().is_consistent());
    assert_eq!(
        store.startup_report().overdue,
        vec![SubtaskRef {
            task_id: added.task_id,
            subtask_id: added.subtask_id,
        }]
    );
    match store.notifications().commands() {
        [NotificationCommand::Schedule(overdue)] => {
            assert_eq!(overdue.kind, ReminderKind::Overdue);
            assert_eq!(overdue.trigger, Trigger::Immediate);
        }
        other => panic!("unexpected commands: {other:?}"),
    }
    assert_eq!(store.notifications().pending_len(), 0);
}

#[test]
fn repeated_validation_keeps_platform_bookkeeping_bounded() {
    let clock = ManualClock::at(NOW);
    let repo = SqliteKvRepository::try_new(open_db_in_memory().unwrap()).unwrap();
    let mut store = TaskStore::open(repo, authorized(), clock.clone());
    let overdue = store
        .add_task(
            "Taxes",
            SubtaskDraft::new("File return").with_deadline(NOW - HOUR, None),
        )
        .unwrap();
    let upcoming = store
        .add_subtask(overdue.task_id, milk_due_in_an_hour())
        .unwrap();
    assert_eq!(store.notifications().pending_len(), 1);

    for _ in 0..3 {
        assert_eq!(store.validate().overdue.len(), 1);
    }
    assert_eq!(store.notifications().pending_len(), 1);

    clock.set(NOW + HOUR / 2);
    store.validate();
    assert_eq!(store.notifications().pending_len(), 0);
    assert!(store.reminders().for_subtask(upcoming.subtask_id).is_empty());

    store.delete_task(overdue.task_id).unwrap();
    assert_eq!(store.notifications().pending_len(), 0);
    assert!(store.reminders().is_empty());
}

#[test]
fn denied_authorization_skips_reminders_but_keeps_mutations() {
    let repo = SqliteKvRepository::try_new(open_db_in_memory().unwrap()).unwrap();
    let mut store = TaskStore::open(
        repo,
        QueuedNotificationCenter::with_authorization(AuthorizationStatus::Denied),
        ManualClock::at(NOW),
    );

    let added = store.add_task("Groceries", milk_due_in_an_hour()).unwrap();
    assert_eq!(added.reminder, None);
    assert_eq!(store.tasks().len(), 1);
    assert!(store.reminders().is_empty());
    assert_eq!(
        store.request_notification_authorization(),
        AuthorizationStatus::Denied
    );
}

#[test]
fn authorization_prompt_is_queued_once_undetermined() {
    let repo = SqliteKvRepository::try_new(open_db_in_memory().unwrap()).unwrap();
    let mut store = TaskStore::open(repo, QueuedNotificationCenter::new(), ManualClock::at(NOW));

    assert_eq!(
        store.request_notification_authorization(),
        AuthorizationStatus::NotDetermined
    );
    assert_eq!(
        store.notifications_mut().drain(),
        vec![NotificationCommand::RequestAuthorization]
    );
    store
        .notifications_mut()
        .set_authorization(AuthorizationStatus::Authorized);
    assert_eq!(
        store.notification_authorization(),
        AuthorizationStatus::Authorized
    );
}

#[test]
fn storage_failures_never_fail_mutations() {
    let mut store = TaskStore::open(FailingRepo, authorized(), ManualClock::at(NOW));
    assert!(matches!(store.load_status(), LoadStatus::ReadFailed(_)));

    let added = store.add_task("Groceries", milk_due_in_an_hour()).unwrap();
    assert!(added.reminder.is_some());
    assert_eq!(store.tasks().len(), 1);
    store
        .delete_subtask(added.task_id, added.subtask_id)
        .unwrap();
    assert!(store.tasks().is_empty());
}

#[test]
fn corrupt_blob_opens_empty_with_decode_status() {
    let repo = SqliteKvRepository::try_new(open_db_in_memory().unwrap()).unwrap();
    repo.put(TASKS_KEY, "{\"legacy\": true}").unwrap();

    let store = TaskStore::open(repo, authorized(), ManualClock::at(NOW));
    assert!(store.tasks().is_empty());
    assert!(matches!(store.load_status(), LoadStatus::DecodeFailed(_)));
}

#[test]
fn observers_receive_snapshots_until_unsubscribed() {
    let mut store = memory_store();
    let calls = Arc::new(AtomicUsize::new(0));
    let last_len = Arc::new(Mutex::new(None));

    let subscription = {
        let calls = Arc::clone(&calls);
        let last_len = Arc::clone(&last_len);
        store.subscribe(Box::new(move |tasks| {
            calls.fetch_add(1, Ordering::SeqCst);
            *last_len.lock().unwrap() = Some(tasks.len());
        }))
    };

    let added = store.add_task("Groceries", SubtaskDraft::new("Buy milk")).unwrap();
    store.rename_task(added.task_id, "Shopping").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(*last_len.lock().unwrap(), Some(1));
    assert_eq!(store.revision(), 2);

    assert!(store.unsubscribe(subscription));
    assert!(!store.unsubscribe(subscription));
    store.delete_task(added.task_id).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(store.revision(), 3);
}

#[test]
fn selection_is_cleared_when_target_is_deleted() {
    let mut store = memory_store();
    let added = store.add_task("Groceries", SubtaskDraft::new("Buy milk")).unwrap();
    let other = store
        .add_subtask(added.task_id, SubtaskDraft::new("Buy eggs"))
        .unwrap();

    assert_eq!(store.selection(), Selection::None);
    store.select_subtask(added.task_id, added.subtask_id).unwrap();
    assert_eq!(
        store.selection().selected().map(|target| target.subtask_id),
        Some(added.subtask_id)
    );

    store
        .delete_subtask(added.task_id, other.subtask_id)
        .unwrap();
    assert!(store.selection().is_subtask(added.subtask_id));

    store.delete_task(added.task_id).unwrap();
    assert_eq!(store.selection(), Selection::None);
    assert!(store
        .select_subtask(added.task_id, added.subtask_id)
        .is_err());
}

#[test]
fn move_subtask_reorders_and_clamps() {
    let mut store = memory_store();
    let first = store.add_task("Errands", SubtaskDraft::new("a")).unwrap();
    let second = store.add_subtask(first.task_id, SubtaskDraft::new("b")).unwrap();
    let third = store.add_subtask(first.task_id, SubtaskDraft::new("c")).unwrap();

    assert_eq!(
        store.move_subtask(first.task_id, first.subtask_id, 99).unwrap(),
        2
    );
    assert_eq!(
        store.move_subtask(first.task_id, third.subtask_id, 0).unwrap(),
        0
    );
    let order = store
        .task(first.task_id)
        .unwrap()
        .subtasks
        .iter()
        .map(|subtask| subtask.id)
        .collect::<Vec<_>>();
    assert_eq!(
        order,
        vec![third.subtask_id, second.subtask_id, first.subtask_id]
    );
}
