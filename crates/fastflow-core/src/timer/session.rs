use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::phases::{self, Phase};
use crate::protocols::Protocol;

const MS_PER_HOUR: f64 = 60.0 * 60.0 * 1000.0;

/// Cloud-sync bookkeeping. Only `Local` is ever written by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Local,
    Pending,
    Synced,
}

/// The single in-progress fast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveFast {
    pub fast_id: Uuid,
    pub device_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub sync_status: SyncStatus,
    pub protocol_id: String,
    pub protocol_name: String,
    pub fast_duration_hours: f64,
    pub start_time: DateTime<Utc>,
    pub planned_end_time: DateTime<Utc>,
    #[serde(default)]
    pub has_triggered_planned_end_notification: bool,
}

impl ActiveFast {
    pub fn new(protocol: &Protocol, fasting_hours: f64, device_id: String, now: DateTime<Utc>) -> Self {
        let planned_ms = (fasting_hours * MS_PER_HOUR).round() as i64;
        Self {
            fast_id: Uuid::new_v4(),
            device_id,
            created_at: now,
            sync_status: SyncStatus::Local,
            protocol_id: protocol.id.to_string(),
            protocol_name: protocol.display_name.to_string(),
            fast_duration_hours: fasting_hours,
            start_time: now,
            planned_end_time: now + chrono::Duration::milliseconds(planned_ms),
            has_triggered_planned_end_notification: false,
        }
    }

    /// Milliseconds since the fast started. Negative only under clock skew.
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start_time).num_milliseconds()
    }

    pub fn elapsed_hours(&self, now: DateTime<Utc>) -> f64 {
        self.elapsed_ms(now) as f64 / MS_PER_HOUR
    }

    /// Milliseconds until the planned end; negative once past it.
    pub fn remaining_to_planned_ms(&self, now: DateTime<Utc>) -> i64 {
        (self.planned_end_time - now).num_milliseconds()
    }

    pub fn is_past_planned_end(&self, now: DateTime<Utc>) -> bool {
        now >= self.planned_end_time
    }
}

/// Why a fast ended. Fasts only end by an explicit stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompletionReason {
    #[default]
    Manual,
}

/// Immutable record of a finished fast, appended to history once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedSession {
    pub fast_id: Uuid,
    pub device_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub sync_status: SyncStatus,
    /// Calendar date (UTC) the fast started on.
    pub date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub planned_end_time: DateTime<Utc>,
    pub actual_end_time: DateTime<Utc>,
    pub duration_ms: i64,
    #[serde(default)]
    pub completion_reason: CompletionReason,
    pub planned_duration_hours: f64,
    /// Rounded to one decimal.
    pub actual_duration_hours: f64,
    pub elapsed_hours: f64,
    pub protocol_id: String,
    pub protocol_name: String,
    pub deepest_phase_id: String,
    pub deepest_phase_title: String,
    pub had_autophagy: bool,
    #[serde(default)]
    pub notes: String,
}

impl CompletedSession {
    /// Finalize `fast` at `ended_at`.
    pub fn finalize(fast: &ActiveFast, device_id: String, ended_at: DateTime<Utc>) -> Self {
        let duration_ms = fast.elapsed_ms(ended_at);
        let elapsed_hours = duration_ms as f64 / MS_PER_HOUR;
        let deepest: &Phase = phases::detect_phase(elapsed_hours);

        Self {
            fast_id: fast.fast_id,
            device_id,
            created_at: fast.created_at,
            updated_at: ended_at,
            sync_status: SyncStatus::Local,
            date: fast.start_time.date_naive(),
            start_time: fast.start_time,
            planned_end_time: fast.planned_end_time,
            actual_end_time: ended_at,
            duration_ms,
            completion_reason: CompletionReason::Manual,
            planned_duration_hours: fast.fast_duration_hours,
            actual_duration_hours: round_tenth(elapsed_hours),
            elapsed_hours,
            protocol_id: fast.protocol_id.clone(),
            protocol_name: fast.protocol_name.clone(),
            deepest_phase_id: deepest.id.to_string(),
            deepest_phase_title: deepest.display_title.to_string(),
            had_autophagy: deepest.has_autophagy,
            notes: format!(
                "Completed {}. Reached: {}",
                fast.protocol_name, deepest.display_title
            ),
        }
    }
}

pub(crate) fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::get_protocol;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 20, 0, 0).unwrap()
    }

    #[test]
    fn planned_end_follows_protocol_hours() {
        let fast = ActiveFast::new(get_protocol("16_8"), 16.0, "dev".into(), t0());
        assert_eq!(fast.planned_end_time, t0() + Duration::hours(16));
        assert_eq!(fast.protocol_name, "16 / 8");
        assert!(!fast.has_triggered_planned_end_notification);
    }

    #[test]
    fn remaining_goes_negative_past_planned_end() {
        let fast = ActiveFast::new(get_protocol("12_12"), 12.0, "dev".into(), t0());
        let later = t0() + Duration::hours(13);
        assert_eq!(fast.remaining_to_planned_ms(later), -3_600_000);
        assert!(fast.is_past_planned_end(later));
        assert!(fast.is_past_planned_end(fast.planned_end_time));
    }

    #[test]
    fn finalize_records_deepest_phase() {
        let fast = ActiveFast::new(get_protocol("16_8"), 16.0, "dev".into(), t0());
        let session = CompletedSession::finalize(&fast, "dev".into(), t0() + Duration::hours(17));
        assert_eq!(session.fast_id, fast.fast_id);
        assert_eq!(session.actual_duration_hours, 17.0);
        assert_eq!(session.deepest_phase_id, "glycogen_waning");
        assert!(session.had_autophagy);
        assert_eq!(session.date, t0().date_naive());
        assert_eq!(session.notes, "Completed 16 / 8. Reached: Glycogen Waning");
    }

    #[test]
    fn active_fast_serializes_camel_case() {
        let fast = ActiveFast::new(get_protocol("16_8"), 16.0, "dev".into(), t0());
        let json = serde_json::to_value(&fast).unwrap();
        assert!(json.get("plannedEndTime").is_some());
        assert!(json.get("hasTriggeredPlannedEndNotification").is_some());
        assert_eq!(json["syncStatus"], "local");
    }

    #[test]
    fn rounding_to_tenth() {
        assert_eq!(round_tenth(16.96), 17.0);
        assert_eq!(round_tenth(16.94), 16.9);
    }
}
