//! Daily fasting-window reminders.
//!
//! Independent of the timer: the user picks a daily start and end time of
//! day, and the scheduler keeps exactly one pending reminder, "start fasting"
//! while idle or "end fasting" while a fast is running.
//!
//! Rescheduling is skipped when the `(next start date, next end date,
//! fasting)` key matches the last one persisted, so calling this on every
//! app-foreground event is cheap.

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::notifications::{
    NotificationCategory, NotificationDescriptor, NotificationExtra, NotificationGateway,
    SchedulerAction, DEFAULT_SOUND,
};
use crate::storage::FastStateStore;

pub const START_NOTIFICATION_ID: u32 = 4101;
pub const END_NOTIFICATION_ID: u32 = 4102;

pub const DEFAULT_START_TIME: &str = "20:00";
pub const DEFAULT_END_TIME: &str = "12:00";

/// User-editable daily window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_start")]
    pub start_time: String,
    #[serde(default = "default_end")]
    pub end_time: String,
}

fn default_start() -> String {
    DEFAULT_START_TIME.into()
}
fn default_end() -> String {
    DEFAULT_END_TIME.into()
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            start_time: default_start(),
            end_time: default_end(),
        }
    }
}

impl SchedulerSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        parse_time_of_day(&self.start_time)?;
        parse_time_of_day(&self.end_time)?;
        Ok(())
    }

    /// Replace unparseable times with the defaults.
    pub fn sanitized(mut self) -> Self {
        if parse_time_of_day(&self.start_time).is_err() {
            tracing::warn!(value = %self.start_time, "invalid scheduler start time, using default");
            self.start_time = default_start();
        }
        if parse_time_of_day(&self.end_time).is_err() {
            tracing::warn!(value = %self.end_time, "invalid scheduler end time, using default");
            self.end_time = default_end();
        }
        self
    }
}

/// Parse a strict `HH:MM` wall-clock value.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, ValidationError> {
    let invalid = || ValidationError::InvalidTime(value.to_string());
    let (h, m) = value.split_once(':').ok_or_else(invalid)?;
    if h.len() != 2 || m.len() != 2 {
        return Err(invalid());
    }
    let hour: u32 = h.parse().map_err(|_| invalid())?;
    let minute: u32 = m.parse().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

/// First instant at `time` strictly after `now`: today if still ahead,
/// otherwise tomorrow. Local times skipped by a DST jump move to the next
/// day on which they exist.
pub fn next_occurrence<Tz: TimeZone>(time: NaiveTime, now: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    for date in now.date_naive().iter_days().take(4) {
        if let Some(candidate) = tz.from_local_datetime(&date.and_time(time)).earliest() {
            if candidate > *now {
                return candidate;
            }
        }
    }
    now.clone() + chrono::Duration::days(1)
}

/// Result of one [`RecurringScheduler::schedule_next`] pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Scheduler turned off; reminders cancelled and dedup key cleared.
    Disabled,
    /// No notification capability; nothing touched.
    Unsupported,
    /// Same key as the last pass; no gateway calls made.
    Unchanged,
    Rescheduled {
        reminder: SchedulerAction,
        fire_at: DateTime<Utc>,
    },
    /// The gateway rejected the reminder; the key was not persisted so the
    /// next pass retries.
    Failed,
}

#[derive(Debug, Clone)]
pub struct RecurringScheduler {
    sound: String,
}

impl Default for RecurringScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_SOUND)
    }
}

impl RecurringScheduler {
    pub fn new(sound: impl Into<String>) -> Self {
        Self {
            sound: sound.into(),
        }
    }

    /// Bring the pending daily reminder in line with the settings and the
    /// current fasting status.
    ///
    /// `is_fasting` must be resolved before the call; it is part of the
    /// dedup key.
    pub fn schedule_next<Tz: TimeZone>(
        &self,
        store: &mut FastStateStore,
        gateway: &mut dyn NotificationGateway,
        is_fasting: bool,
        now: &DateTime<Tz>,
    ) -> ScheduleOutcome {
        let settings = store.scheduler_settings();

        if !settings.enabled {
            if gateway.check_permission().is_ok() {
                if let Err(e) = gateway.cancel(&[START_NOTIFICATION_ID, END_NOTIFICATION_ID]) {
                    tracing::warn!(error = %e, "failed to cancel scheduler reminders");
                }
            }
            if let Err(e) = store.set_last_scheduled_key("") {
                tracing::warn!(error = %e, "failed to clear scheduler key");
            }
            return ScheduleOutcome::Disabled;
        }

        if let Err(e) = gateway.check_permission() {
            tracing::info!(reason = %e, "notifications unavailable - skipping scheduler");
            return ScheduleOutcome::Unsupported;
        }

        let (Ok(start), Ok(end)) = (
            parse_time_of_day(&settings.start_time),
            parse_time_of_day(&settings.end_time),
        ) else {
            // Unreachable for settings read through the store, which sanitizes.
            return ScheduleOutcome::Failed;
        };
        let next_start = next_occurrence(start, now);
        let next_end = next_occurrence(end, now);
        let key = schedule_key(&next_start, &next_end, is_fasting);

        if store.last_scheduled_key().as_deref() == Some(key.as_str()) {
            tracing::debug!(%key, "scheduler reminders already up to date");
            return ScheduleOutcome::Unchanged;
        }

        if let Err(e) = gateway.cancel(&[START_NOTIFICATION_ID, END_NOTIFICATION_ID]) {
            tracing::warn!(error = %e, "failed to cancel scheduler reminders");
        }

        let (action, reminder) = if is_fasting {
            (SchedulerAction::End, self.end_reminder(next_end.with_timezone(&Utc)))
        } else {
            (SchedulerAction::Start, self.start_reminder(next_start.with_timezone(&Utc)))
        };
        let fire_at = reminder.fire_at;

        if let Err(e) = gateway.schedule(std::slice::from_ref(&reminder)) {
            tracing::warn!(error = %e, "failed to schedule scheduler reminder");
            return ScheduleOutcome::Failed;
        }
        if let Err(e) = store.set_last_scheduled_key(&key) {
            tracing::warn!(error = %e, "failed to persist scheduler key");
        }
        tracing::info!(?action, %fire_at, "scheduler reminder scheduled");

        ScheduleOutcome::Rescheduled {
            reminder: action,
            fire_at,
        }
    }

    fn start_reminder(&self, fire_at: DateTime<Utc>) -> NotificationDescriptor {
        NotificationDescriptor {
            id: START_NOTIFICATION_ID,
            title: "It\u{2019}s time to start your fast".into(),
            body: "Tap to begin when you\u{2019}re ready.".into(),
            fire_at,
            sound: self.sound.clone(),
            category: NotificationCategory::SchedulerStart,
            extra: NotificationExtra {
                scheduler_action: Some(SchedulerAction::Start),
            },
        }
    }

    fn end_reminder(&self, fire_at: DateTime<Utc>) -> NotificationDescriptor {
        NotificationDescriptor {
            id: END_NOTIFICATION_ID,
            title: "Your fasting window is complete".into(),
            body: "Tap to end your fast when you\u{2019}re ready.".into(),
            fire_at,
            sound: self.sound.clone(),
            category: NotificationCategory::SchedulerEnd,
            extra: NotificationExtra {
                scheduler_action: Some(SchedulerAction::End),
            },
        }
    }
}

fn schedule_key<Tz: TimeZone>(next_start: &DateTime<Tz>, next_end: &DateTime<Tz>, is_fasting: bool) -> String {
    format!(
        "{}|{}|{}",
        next_start.date_naive(),
        next_end.date_naive(),
        is_fasting
    )
}
