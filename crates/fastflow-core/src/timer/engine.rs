//! Fasting service: the timer state machine.
//!
//! The service is wall-clock based. Elapsed time, remaining time and phase
//! are re-derived from the persisted start time on every evaluation, never
//! accumulated, so a suspended or killed process loses nothing.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Fasting -> ExtendedFasting -> Idle
//!           \___________________________/
//!                      stop()
//! ```
//!
//! Only "an active fast exists" is persisted; `Fasting` vs
//! `ExtendedFasting` is derived from `now` against the planned end.
//! Nothing but [`FastingService::stop`] ends a fast.
//!
//! ## Usage
//!
//! ```ignore
//! let mut service = FastingService::new(store, gateway, Arc::new(SystemClock));
//! service.resume();
//! service.start("16_8");
//! // Once per second, e.g. via `timer::spawn_ticker`:
//! service.tick();
//! ```

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::session::{ActiveFast, CompletedSession};
use crate::clock::{Clock, SystemClock};
use crate::error::{CoreError, Result, ValidationError};
use crate::events::{Event, EventEmitter};
use crate::history::{self, FastingStats};
use crate::notifications::planner;
use crate::notifications::{NotificationCategory, NotificationGateway, SchedulerAction};
use crate::phases;
use crate::preferences::{MaintenanceState, NotificationPreferences};
use crate::protocols::{self, Protocol, CUSTOM_PROTOCOL_ID};
use crate::scheduler::{
    RecurringScheduler, ScheduleOutcome, SchedulerSettings, END_NOTIFICATION_ID,
    START_NOTIFICATION_ID,
};
use crate::storage::{AppendOutcome, Config, Database, FastStateStore};

/// Upper bound for a custom fast, in hours.
pub const MAX_CUSTOM_FASTING_HOURS: f64 = 168.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FastStatus {
    Idle,
    Fasting,
    /// Still fasting past the planned end.
    ExtendedFasting,
}

/// Derived view of the active fast at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub status: FastStatus,
    pub elapsed_ms: i64,
    pub elapsed_hours: f64,
    /// `HH:MM:SS`, floored to the second.
    pub elapsed_display: String,
    pub is_past_planned_end: bool,
    /// Negative once past the planned end.
    pub remaining_to_planned_ms: i64,
    pub current_phase_id: String,
    pub current_phase_title: String,
    pub phase_progress: String,
    pub planned_duration_hours: f64,
}

impl TimerSnapshot {
    pub fn capture(fast: &ActiveFast, now: DateTime<Utc>) -> Self {
        let elapsed_ms = fast.elapsed_ms(now);
        let elapsed_hours = fast.elapsed_hours(now);
        let is_past_planned_end = fast.is_past_planned_end(now);
        let phase = phases::detect_phase(elapsed_hours);
        Self {
            status: if is_past_planned_end {
                FastStatus::ExtendedFasting
            } else {
                FastStatus::Fasting
            },
            elapsed_ms,
            elapsed_hours,
            elapsed_display: format_hms(elapsed_ms.max(0) as u64),
            is_past_planned_end,
            remaining_to_planned_ms: fast.remaining_to_planned_ms(now),
            current_phase_id: phase.id.to_string(),
            current_phase_title: phase.display_title.to_string(),
            phase_progress: phases::phase_progress_string(elapsed_hours),
            planned_duration_hours: fast.fast_duration_hours,
        }
    }
}

/// Summary for widgets and the dashboard header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerStats {
    pub is_active: bool,
    pub elapsed_hours: f64,
    pub planned_hours: f64,
    pub current_phase: String,
    pub protocol_name: String,
    pub is_past_planned: bool,
}

/// Format milliseconds as `HH:MM:SS`. Hours are not wrapped at 24.
pub fn format_hms(ms: u64) -> String {
    let total_secs = ms / 1000;
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

/// Ids owned by the fast planner, cancelled before every replan.
fn planner_ids() -> Vec<u32> {
    [
        NotificationCategory::FastEndingSoon,
        NotificationCategory::FastComplete,
        NotificationCategory::Hydration,
        NotificationCategory::PhaseTransition,
    ]
    .into_iter()
    .flat_map(|c| c.id_range())
    .collect()
}

/// Owns the active fast and everything that reacts to it.
pub struct FastingService {
    store: FastStateStore,
    gateway: Box<dyn NotificationGateway>,
    clock: Arc<dyn Clock>,
    events: EventEmitter,
    scheduler: RecurringScheduler,
    config: Config,
    /// Offset used for the daily scheduler; `None` means the system zone.
    local_offset: Option<FixedOffset>,
    /// In-memory copy of the active fast. Writes go through to the store;
    /// if a write fails the fast keeps running from this copy.
    active: Option<ActiveFast>,
    ticking: bool,
}

impl FastingService {
    pub fn new(
        store: FastStateStore,
        gateway: impl NotificationGateway + 'static,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let active = store.active_fast();
        Self {
            store,
            gateway: Box::new(gateway),
            clock,
            events: EventEmitter::new(),
            scheduler: RecurringScheduler::default(),
            config: Config::default(),
            local_offset: None,
            active,
            ticking: false,
        }
    }

    /// Open the SQLite database named in `config` under the data directory.
    pub fn open(config: Config, gateway: impl NotificationGateway + 'static) -> Result<Self> {
        let db = Database::open(&config.storage.database_file)?;
        Ok(Self::new(FastStateStore::new(db), gateway, Arc::new(SystemClock)).with_config(config))
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.scheduler = RecurringScheduler::new(config.notifications.sound.clone());
        self.config = config;
        self
    }

    pub fn with_local_offset(mut self, offset: FixedOffset) -> Self {
        self.local_offset = Some(offset);
        self
    }

    pub fn subscribe(&mut self, listener: impl Fn(&Event) + Send + 'static) {
        self.events.subscribe(listener);
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &FastStateStore {
        &self.store
    }

    pub fn active_fast(&self) -> Option<&ActiveFast> {
        self.active.as_ref()
    }

    pub fn is_fasting(&self) -> bool {
        self.active.is_some()
    }

    /// Whether the display refresh loop should be running.
    pub fn is_ticking(&self) -> bool {
        self.ticking
    }

    pub fn status(&self) -> FastStatus {
        match &self.active {
            None => FastStatus::Idle,
            Some(fast) if fast.is_past_planned_end(self.clock.now()) => FastStatus::ExtendedFasting,
            Some(_) => FastStatus::Fasting,
        }
    }

    /// Current derived timer data without side effects.
    pub fn snapshot(&self) -> Option<TimerSnapshot> {
        self.active
            .as_ref()
            .map(|fast| TimerSnapshot::capture(fast, self.clock.now()))
    }

    pub fn timer_stats(&self) -> Option<TimerStats> {
        let fast = self.active.as_ref()?;
        let now = self.clock.now();
        let elapsed_hours = fast.elapsed_hours(now);
        Some(TimerStats {
            is_active: true,
            elapsed_hours,
            planned_hours: fast.fast_duration_hours,
            current_phase: phases::detect_phase(elapsed_hours).display_title.to_string(),
            protocol_name: fast.protocol_name.clone(),
            is_past_planned: fast.is_past_planned_end(now),
        })
    }

    pub fn history(&self) -> Result<Vec<CompletedSession>> {
        Ok(self.store.history()?)
    }

    pub fn fasting_stats(&self) -> Result<FastingStats> {
        Ok(history::stats(&self.store.history()?))
    }

    /// Remove one recorded fast. Returns `false` if it was not recorded.
    pub fn delete_session(&mut self, fast_id: Uuid) -> Result<bool> {
        let deleted = self.store.delete_session(fast_id)?;
        if deleted {
            tracing::info!(%fast_id, "deleted fasting session");
            self.events.emit(&Event::FastingHistoryUpdated);
        }
        Ok(deleted)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a fast with `protocol_id`, or resume the one already running.
    ///
    /// Unknown protocols fall back to the default. Never fails: persistence
    /// and notification problems are logged and the fast runs regardless.
    pub fn start(&mut self, protocol_id: &str) -> ActiveFast {
        if let Some(existing) = self.resume_existing() {
            return existing;
        }

        let protocol = protocols::get_protocol(protocol_id);
        let hours = match protocol.fasting_hours {
            Some(hours) => hours,
            None => {
                let fallback = protocols::default_protocol();
                tracing::warn!(
                    protocol_id = protocol.id,
                    fallback = fallback.id,
                    "protocol has no fixed length, using default duration"
                );
                fallback.fasting_hours.unwrap_or(MAX_CUSTOM_FASTING_HOURS)
            }
        };
        self.begin(protocol, hours)
    }

    /// Start a fast with the last selected protocol, or the configured one.
    pub fn start_default(&mut self) -> ActiveFast {
        let protocol_id = self
            .store
            .selected_protocol()
            .unwrap_or_else(|| self.config.default_protocol.clone());
        self.start(&protocol_id)
    }

    /// Start a `custom` fast of `hours`.
    ///
    /// # Errors
    /// Returns a validation error unless `0 < hours <= 168`. If a fast is
    /// already running it is returned unchanged, whatever `hours` says.
    pub fn start_custom(&mut self, hours: f64) -> Result<ActiveFast> {
        if let Some(existing) = self.resume_existing() {
            return Ok(existing);
        }
        if !hours.is_finite() || hours <= 0.0 || hours > MAX_CUSTOM_FASTING_HOURS {
            return Err(ValidationError::InvalidFastingHours {
                hours,
                max: MAX_CUSTOM_FASTING_HOURS,
            }
            .into());
        }
        let protocol = protocols::get_protocol(CUSTOM_PROTOCOL_ID);
        Ok(self.begin(protocol, hours))
    }

    fn resume_existing(&mut self) -> Option<ActiveFast> {
        let existing = self.active.clone()?;
        tracing::info!(fast_id = %existing.fast_id, "fast already active");
        self.ticking = true;
        Some(existing)
    }

    fn begin(&mut self, protocol: &Protocol, hours: f64) -> ActiveFast {
        let now = self.clock.now();
        let device_id = self.store.device_id();
        let fast = ActiveFast::new(protocol, hours, device_id, now);

        if let Err(e) = self.store.set_active_fast(&fast) {
            tracing::warn!(error = %e, "failed to persist active fast, continuing in memory");
        }
        if let Err(e) = self.store.set_selected_protocol(protocol.id) {
            tracing::warn!(error = %e, "failed to persist selected protocol");
        }
        self.active = Some(fast.clone());
        self.events.emit(&Event::FastStateChanged { is_fasting: true });

        self.replan_notifications();
        self.reschedule_reminders();
        self.ticking = true;

        tracing::info!(
            fast_id = %fast.fast_id,
            protocol = protocol.id,
            planned_end = %fast.planned_end_time,
            "fast started"
        );
        fast
    }

    /// End the active fast and record it.
    ///
    /// # Errors
    /// `NoActiveFast` if nothing is running. A failed history write is
    /// returned as `Persistence` and the fast stays active so the caller
    /// can retry.
    pub fn stop(&mut self) -> Result<CompletedSession> {
        let fast = self.active.clone().ok_or(CoreError::NoActiveFast)?;
        let now = self.clock.now();
        let device_id = self.store.device_id();
        let session = CompletedSession::finalize(&fast, device_id, now);

        // History first: a crash after this point must not lose the session.
        match self.store.append_session(&session) {
            Ok(AppendOutcome::Inserted) => {
                tracing::info!(fast_id = %session.fast_id, "fasting history write succeeded");
            }
            Ok(AppendOutcome::AlreadyRecorded) => {}
            Err(e) => {
                tracing::error!(fast_id = %session.fast_id, error = %e, "fasting history write failed");
                return Err(e.into());
            }
        }

        self.active = None;
        if let Err(e) = self.store.clear_active_fast() {
            tracing::warn!(error = %e, "failed to clear persisted active fast");
        }
        self.events.emit(&Event::FastStateChanged { is_fasting: false });
        self.ticking = false;

        if let Err(e) = self.gateway.cancel_all() {
            tracing::info!(reason = %e, "could not cancel pending notifications");
        }
        self.reschedule_reminders();

        tracing::info!(
            fast_id = %session.fast_id,
            hours = session.actual_duration_hours,
            phase = %session.deepest_phase_id,
            "fast stopped"
        );
        self.events.emit(&Event::FastingHistoryUpdated);
        Ok(session)
    }

    /// Refresh derived timer data and fire the one-shot planned-end event.
    ///
    /// Never ends the fast, however far past the planned end it is.
    pub fn tick(&mut self) -> Option<TimerSnapshot> {
        let now = self.clock.now();
        let Some(fast) = self.active.as_mut() else {
            self.ticking = false;
            return None;
        };

        let snapshot = TimerSnapshot::capture(fast, now);
        self.events.emit(&Event::TimerUpdate {
            snapshot: snapshot.clone(),
        });

        if snapshot.is_past_planned_end && !fast.has_triggered_planned_end_notification {
            fast.has_triggered_planned_end_notification = true;
            if let Err(e) = self.store.set_active_fast(fast) {
                tracing::warn!(error = %e, "failed to persist planned-end flag");
            }
            self.events.emit(&Event::FastPlannedEndReached {
                planned_hours: fast.fast_duration_hours,
            });
        }
        Some(snapshot)
    }

    /// Re-arm after a process restart. Start and planned end are untouched.
    ///
    /// Returns whether a fast is running.
    pub fn resume(&mut self) -> bool {
        if self.active.is_none() {
            self.active = self.store.active_fast();
        }
        self.ticking = self.active.is_some();
        if let Some(fast) = &self.active {
            tracing::info!(fast_id = %fast.fast_id, "resumed active fast");
        }
        self.reschedule_reminders();
        self.ticking
    }

    /// Act on the `schedulerAction` carried by a tapped reminder.
    pub fn handle_notification_action(&mut self, action: SchedulerAction) -> Result<()> {
        match action {
            SchedulerAction::Start => {
                self.start_default();
                Ok(())
            }
            SchedulerAction::End if self.active.is_none() => {
                tracing::info!("end reminder tapped with no active fast");
                Ok(())
            }
            SchedulerAction::End => self.stop().map(|_| ()),
        }
    }

    // ── Notifications ────────────────────────────────────────────────

    /// Replace the planner's pending notifications for the active fast.
    pub fn replan_notifications(&mut self) {
        if !self.config.notifications.enabled {
            tracing::debug!("notifications disabled in config");
            return;
        }
        let Some(fast) = &self.active else {
            return;
        };
        if let Err(e) = self.gateway.check_permission() {
            tracing::info!(reason = %e, "notifications not supported - skipping");
            return;
        }

        let protocol = protocols::get_protocol(&fast.protocol_id);
        let prefs = self.store.notification_preferences();
        let maintenance = self.store.is_maintenance_active();
        let mut batch = planner::plan(fast, protocol, &prefs, maintenance, self.clock.now());
        for notification in &mut batch {
            notification.sound.clone_from(&self.config.notifications.sound);
        }

        if let Err(e) = self.gateway.cancel(&planner_ids()) {
            tracing::warn!(error = %e, "failed to cancel planned notifications");
        }
        if batch.is_empty() {
            return;
        }
        match self.gateway.schedule(&batch) {
            Ok(()) => tracing::info!(count = batch.len(), "scheduled notifications"),
            Err(e) => tracing::warn!(error = %e, "failed to schedule notifications"),
        }
    }

    /// Run the daily scheduler against the current fasting status.
    pub fn reschedule_reminders(&mut self) -> ScheduleOutcome {
        if !self.config.notifications.enabled {
            if let Err(e) = self.gateway.cancel(&[START_NOTIFICATION_ID, END_NOTIFICATION_ID]) {
                tracing::debug!(reason = %e, "could not cancel scheduler reminders");
            }
            if let Err(e) = self.store.set_last_scheduled_key("") {
                tracing::warn!(error = %e, "failed to clear scheduler key");
            }
            return ScheduleOutcome::Disabled;
        }
        let is_fasting = self.active.is_some();
        let now = self.clock.now();
        match self.local_offset {
            Some(offset) => self.scheduler.schedule_next(
                &mut self.store,
                self.gateway.as_mut(),
                is_fasting,
                &now.with_timezone(&offset),
            ),
            None => self.scheduler.schedule_next(
                &mut self.store,
                self.gateway.as_mut(),
                is_fasting,
                &now.with_timezone(&Local),
            ),
        }
    }

    // ── Settings ─────────────────────────────────────────────────────

    pub fn notification_preferences(&self) -> NotificationPreferences {
        self.store.notification_preferences()
    }

    pub fn set_notification_preferences(&mut self, prefs: &NotificationPreferences) -> Result<()> {
        self.store.save_notification_preferences(prefs)?;
        self.replan_notifications();
        Ok(())
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        self.store.scheduler_settings()
    }

    /// Validate and save the daily window, then reschedule.
    ///
    /// The dedup key only covers dates, so it is cleared here to pick up a
    /// changed time of day.
    pub fn set_scheduler_settings(&mut self, settings: &SchedulerSettings) -> Result<ScheduleOutcome> {
        settings.validate()?;
        self.store.save_scheduler_settings(settings)?;
        self.store.set_last_scheduled_key("")?;
        Ok(self.reschedule_reminders())
    }

    /// Remember `protocol_id` for [`Self::start_default`]. Unknown ids are
    /// stored as the default protocol.
    pub fn select_protocol(&mut self, protocol_id: &str) -> Result<&'static Protocol> {
        let protocol = protocols::get_protocol(protocol_id);
        self.store.set_selected_protocol(protocol.id)?;
        Ok(protocol)
    }

    pub fn maintenance_state(&self) -> MaintenanceState {
        self.store.maintenance_state()
    }

    /// Turn maintenance mode on. Returns `false` if it already was.
    pub fn activate_maintenance(&mut self, reason: Option<String>, notes: String) -> Result<bool> {
        let mut state = self.store.maintenance_state();
        if !state.activate(reason, notes, self.clock.now()) {
            return Ok(false);
        }
        self.store.save_maintenance_state(&state)?;
        self.replan_notifications();
        Ok(true)
    }

    /// Turn maintenance mode off. Returns `false` if it was not on.
    pub fn deactivate_maintenance(&mut self) -> Result<bool> {
        let mut state = self.store.maintenance_state();
        if !state.deactivate(self.clock.now()) {
            return Ok(false);
        }
        self.store.save_maintenance_state(&state)?;
        self.replan_notifications();
        Ok(true)
    }
}
