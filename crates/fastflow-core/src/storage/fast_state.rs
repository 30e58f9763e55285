//! Typed records on top of a [`KeyValueStore`].
//!
//! Every record is a JSON blob under a fixed key. The active fast is a single
//! slot, never a collection, so at most one fast can exist.

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use super::KeyValueStore;
use crate::error::StorageError;
use crate::preferences::{MaintenanceState, NotificationPreferences};
use crate::scheduler::SchedulerSettings;
use crate::timer::{ActiveFast, CompletedSession};

/// Keys used in the backing store.
pub mod keys {
    pub const ACTIVE_FAST: &str = "activeFast";
    pub const FASTING_HISTORY: &str = "fastflow_fasting_history";
    pub const SCHEDULER_SETTINGS: &str = "fasting_scheduler";
    pub const SCHEDULER_LAST_SCHEDULED: &str = "fasting_scheduler_last_scheduled";
    pub const NOTIFICATION_PREFS: &str = "notificationPreferences";
    pub const MAINTENANCE_STATE: &str = "maintenanceMode";
    pub const DEVICE_ID: &str = "deviceId";
    pub const SELECTED_PROTOCOL: &str = "selectedProtocol";
}

/// Result of appending a finished fast to history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted,
    AlreadyRecorded,
}

pub struct FastStateStore {
    backend: Box<dyn KeyValueStore>,
}

impl FastStateStore {
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.backend.get(key)? {
            None => Ok(None),
            Some(raw) if raw.is_empty() => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StorageError::Corrupt {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    fn write_json<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|source| StorageError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.backend.set(key, &raw)
    }

    /// Read a settings-like record, falling back to its default when missing
    /// or unreadable.
    fn read_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.read_json(key) {
            Ok(value) => value.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(key, error = %e, "falling back to defaults");
                T::default()
            }
        }
    }

    // ── Active fast ──────────────────────────────────────────────────

    /// The persisted active fast. An unreadable record counts as no fast.
    pub fn active_fast(&self) -> Option<ActiveFast> {
        match self.read_json(keys::ACTIVE_FAST) {
            Ok(fast) => fast,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable active fast record");
                None
            }
        }
    }

    pub fn set_active_fast(&mut self, fast: &ActiveFast) -> Result<(), StorageError> {
        self.write_json(keys::ACTIVE_FAST, fast)
    }

    pub fn clear_active_fast(&mut self) -> Result<(), StorageError> {
        self.backend.remove(keys::ACTIVE_FAST)
    }

    // ── History ──────────────────────────────────────────────────────

    /// All recorded sessions in insertion order.
    ///
    /// # Errors
    /// Fails on an unreadable history rather than returning an empty list,
    /// so a later append can never overwrite recorded sessions.
    pub fn history(&self) -> Result<Vec<CompletedSession>, StorageError> {
        Ok(self.read_json(keys::FASTING_HISTORY)?.unwrap_or_default())
    }

    /// Append `session` unless its `fast_id` is already recorded.
    pub fn append_session(
        &mut self,
        session: &CompletedSession,
    ) -> Result<AppendOutcome, StorageError> {
        let mut history = self.history()?;
        if history.iter().any(|s| s.fast_id == session.fast_id) {
            tracing::info!(fast_id = %session.fast_id, "fasting history already contains this session");
            return Ok(AppendOutcome::AlreadyRecorded);
        }
        history.push(session.clone());
        self.write_json(keys::FASTING_HISTORY, &history)?;
        Ok(AppendOutcome::Inserted)
    }

    /// Returns `false` if no session had that id.
    pub fn delete_session(&mut self, fast_id: Uuid) -> Result<bool, StorageError> {
        let mut history = self.history()?;
        let before = history.len();
        history.retain(|s| s.fast_id != fast_id);
        if history.len() == before {
            return Ok(false);
        }
        self.write_json(keys::FASTING_HISTORY, &history)?;
        Ok(true)
    }

    // ── Preferences and settings ─────────────────────────────────────

    pub fn notification_preferences(&self) -> NotificationPreferences {
        self.read_or_default(keys::NOTIFICATION_PREFS)
    }

    pub fn save_notification_preferences(
        &mut self,
        prefs: &NotificationPreferences,
    ) -> Result<(), StorageError> {
        self.write_json(keys::NOTIFICATION_PREFS, prefs)
    }

    pub fn maintenance_state(&self) -> MaintenanceState {
        self.read_or_default(keys::MAINTENANCE_STATE)
    }

    pub fn save_maintenance_state(&mut self, state: &MaintenanceState) -> Result<(), StorageError> {
        self.write_json(keys::MAINTENANCE_STATE, state)
    }

    pub fn is_maintenance_active(&self) -> bool {
        self.maintenance_state().is_active
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        let settings: SchedulerSettings = self.read_or_default(keys::SCHEDULER_SETTINGS);
        settings.sanitized()
    }

    pub fn save_scheduler_settings(
        &mut self,
        settings: &SchedulerSettings,
    ) -> Result<(), StorageError> {
        self.write_json(keys::SCHEDULER_SETTINGS, settings)
    }

    pub fn last_scheduled_key(&self) -> Option<String> {
        match self.backend.get(keys::SCHEDULER_LAST_SCHEDULED) {
            Ok(key) => key.filter(|k| !k.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read last scheduler key");
                None
            }
        }
    }

    pub fn set_last_scheduled_key(&mut self, key: &str) -> Result<(), StorageError> {
        self.backend.set(keys::SCHEDULER_LAST_SCHEDULED, key)
    }

    pub fn selected_protocol(&self) -> Option<String> {
        self.backend
            .get(keys::SELECTED_PROTOCOL)
            .ok()
            .flatten()
            .filter(|id| !id.is_empty())
    }

    pub fn set_selected_protocol(&mut self, protocol_id: &str) -> Result<(), StorageError> {
        self.backend.set(keys::SELECTED_PROTOCOL, protocol_id)
    }

    /// The persisted device id, generating one on first use.
    ///
    /// If the new id cannot be persisted it is still returned, so the current
    /// fast is attributed consistently for this process.
    pub fn device_id(&mut self) -> String {
        if let Ok(Some(id)) = self.backend.get(keys::DEVICE_ID) {
            if !id.is_empty() {
                return id;
            }
        }
        let id = Uuid::new_v4().to_string();
        match self.backend.set(keys::DEVICE_ID, &id) {
            Ok(()) => tracing::info!(device_id = %id, "generated new device id"),
            Err(e) => tracing::warn!(error = %e, "failed to persist device id"),
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::get_protocol;
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};

    fn session(hours: i64) -> CompletedSession {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 20, 0, 0).unwrap();
        let fast = ActiveFast::new(get_protocol("16_8"), 16.0, "dev".into(), start);
        CompletedSession::finalize(&fast, "dev".into(), start + Duration::hours(hours))
    }

    #[test]
    fn history_append_is_idempotent() {
        let mut store = FastStateStore::new(MemoryStore::new());
        let s = session(17);
        assert_eq!(store.append_session(&s).unwrap(), AppendOutcome::Inserted);
        assert_eq!(store.append_session(&s).unwrap(), AppendOutcome::AlreadyRecorded);
        assert_eq!(store.history().unwrap().len(), 1);
    }

    #[test]
    fn corrupt_history_is_an_error_not_empty() {
        let mut backend = MemoryStore::new();
        backend.set(keys::FASTING_HISTORY, "{not json").unwrap();
        let mut store = FastStateStore::new(backend);
        assert!(matches!(store.history(), Err(StorageError::Corrupt { .. })));
        assert!(store.append_session(&session(17)).is_err());
    }

    #[test]
    fn corrupt_active_fast_reads_as_none() {
        let mut backend = MemoryStore::new();
        backend.set(keys::ACTIVE_FAST, "garbage").unwrap();
        let store = FastStateStore::new(backend);
        assert!(store.active_fast().is_none());
    }

    #[test]
    fn delete_session_by_id() {
        let mut store = FastStateStore::new(MemoryStore::new());
        let a = session(17);
        let b = session(20);
        store.append_session(&a).unwrap();
        store.append_session(&b).unwrap();
        assert!(store.delete_session(a.fast_id).unwrap());
        assert!(!store.delete_session(a.fast_id).unwrap());
        assert_eq!(store.history().unwrap(), vec![b]);
    }

    #[test]
    fn device_id_is_stable() {
        let mut store = FastStateStore::new(MemoryStore::new());
        let first = store.device_id();
        assert_eq!(store.device_id(), first);
    }

    #[test]
    fn unreadable_preferences_fall_back_to_defaults() {
        let mut backend = MemoryStore::new();
        backend.set(keys::NOTIFICATION_PREFS, "[]").unwrap();
        let store = FastStateStore::new(backend);
        assert_eq!(store.notification_preferences(), NotificationPreferences::default());
        assert!(!store.is_maintenance_active());
    }

    #[test]
    fn empty_last_key_reads_as_none() {
        let mut store = FastStateStore::new(MemoryStore::new());
        store.set_last_scheduled_key("").unwrap();
        assert!(store.last_scheduled_key().is_none());
        store.set_last_scheduled_key("k").unwrap();
        assert_eq!(store.last_scheduled_key().as_deref(), Some("k"));
    }
}
