//! Persistence adapter for the task collection and reminder registry.
//!
//! # Responsibility
//! - Encode/decode the full task collection as one JSON blob.
//! - Degrade every load failure to an empty value instead of failing.
//! - Report save failures as non-fatal outcomes.
//!
//! # Invariants
//! - `load` never returns an error; degraded loads are visible in
//!   `LoadStatus`.
//! - A failed `save` leaves the last committed blob intact.

use crate::model::task::Task;
use crate::repo::kv_repo::KvRepository;
use crate::service::reminder_scheduler::ReminderRegistry;
use log::{error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Storage key for the task collection.
pub const TASKS_KEY: &str = "tasks";
/// Storage key for the reminder registry.
pub const REMINDERS_KEY: &str = "reminders";

/// How a load resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// No prior state under the key.
    Empty,
    Loaded,
    /// Store could not be read; value is empty.
    ReadFailed(String),
    /// Stored blob did not decode; value is empty and prior data is dropped.
    DecodeFailed(String),
}

impl LoadStatus {
    /// Returns whether prior state may have been lost.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::ReadFailed(_) | Self::DecodeFailed(_))
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Loaded => "loaded",
            Self::ReadFailed(_) => "read_failed",
            Self::DecodeFailed(_) => "decode_failed",
        }
    }
}

/// Loaded value plus how the load resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded<T> {
    pub value: T,
    pub status: LoadStatus,
}

/// Blob persistence over a key-value repository.
pub struct TaskPersistence<K: KvRepository> {
    repo: K,
}

impl<K: KvRepository> TaskPersistence<K> {
    pub fn new(repo: K) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &K {
        &self.repo
    }

    /// Loads the task collection; empty on missing, unreadable or corrupt state.
    pub fn load(&self) -> Loaded<Vec<Task>> {
        self.load_key(TASKS_KEY)
    }

    /// Persists the full task collection. Returns `false` on failure.
    pub fn save(&self, tasks: &[Task]) -> bool {
        self.save_key(TASKS_KEY, tasks)
    }

    /// Loads the reminder registry with the same degradation rules as `load`.
    pub fn load_reminders(&self) -> Loaded<ReminderRegistry> {
        self.load_key(REMINDERS_KEY)
    }

    /// Persists the reminder registry. Returns `false` on failure.
    pub fn save_reminders(&self, registry: &ReminderRegistry) -> bool {
        self.save_key(REMINDERS_KEY, registry)
    }

    fn load_key<T: DeserializeOwned + Default>(&self, key: &'static str) -> Loaded<T> {
        let raw = match self.repo.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                return Loaded {
                    value: T::default(),
                    status: LoadStatus::Empty,
                }
            }
            Err(err) => {
                error!(
                    "event=store_load module=persistence status=error key={} error_code=read_failed error={}",
                    key, err
                );
                return Loaded {
                    value: T::default(),
                    status: LoadStatus::ReadFailed(err.to_string()),
                };
            }
        };

        let loaded = match serde_json::from_str::<T>(&raw) {
            Ok(value) => Loaded {
                value,
                status: LoadStatus::Loaded,
            },
            Err(err) => {
                warn!(
                    "event=store_load module=persistence status=error key={} error_code=decode_failed bytes={} error={}",
                    key,
                    raw.len(),
                    err
                );
                Loaded {
                    value: T::default(),
                    status: LoadStatus::DecodeFailed(err.to_string()),
                }
            }
        };
        info!(
            "event=store_load module=persistence status=ok key={} outcome={}",
            key,
            loaded.status.as_str()
        );
        loaded
    }

    fn save_key<T: Serialize + ?Sized>(&self, key: &'static str, value: &T) -> bool {
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(err) => {
                error!(
                    "event=store_save module=persistence status=error key={} error_code=encode_failed error={}",
                    key, err
                );
                return false;
            }
        };

        match self.repo.put(key, &encoded) {
            Ok(()) => {
                info!(
                    "event=store_save module=persistence status=ok key={} bytes={}",
                    key,
                    encoded.len()
                );
                true
            }
            Err(err) => {
                error!(
                    "event=store_save module=persistence status=error key={} error_code=write_failed error={}",
                    key, err
                );
                false
            }
        }
    }
}
