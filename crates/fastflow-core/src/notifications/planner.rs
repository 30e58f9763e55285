//! Notification planning for an active fast.
//!
//! [`plan`] is a pure function: the same fast, protocol, preferences and
//! instant always produce the same descriptors in the same order. The
//! service applies the result with cancel-all-then-schedule.
//!
//! Steps, each gated independently:
//!
//! 1. fast ending soon      id 1
//! 2. planned fast complete id 2
//! 3. hydration reminders   ids 100..124
//! 4. phase transitions     ids 200..220

use chrono::{DateTime, Duration, Utc};

use super::{NotificationCategory, NotificationDescriptor, NotificationExtra, DEFAULT_SOUND};
use crate::phases::PHASES;
use crate::preferences::NotificationPreferences;
use crate::protocols::Protocol;
use crate::timer::ActiveFast;

pub const FAST_ENDING_SOON_ID: u32 = 1;
pub const FAST_COMPLETE_ID: u32 = 2;
pub const HYDRATION_BASE_ID: u32 = 100;
pub const MAX_HYDRATION_REMINDERS: u32 = 24;
pub const PHASE_BASE_ID: u32 = 200;
pub const MAX_PHASE_REMINDERS: u32 = 20;

pub const HYDRATION_INTERVAL_MINUTES: i64 = 60;
pub const MAINTENANCE_HYDRATION_INTERVAL_MINUTES: i64 = 120;

/// Used when a protocol carries no lead time of its own.
const FALLBACK_LEAD_HOURS: f64 = 1.0;

fn hours(h: f64) -> Duration {
    Duration::milliseconds((h * 3_600_000.0).round() as i64)
}

fn descriptor(
    id: u32,
    category: NotificationCategory,
    title: String,
    body: String,
    fire_at: DateTime<Utc>,
) -> NotificationDescriptor {
    NotificationDescriptor {
        id,
        title,
        body,
        fire_at,
        sound: DEFAULT_SOUND.to_string(),
        category,
        extra: NotificationExtra::default(),
    }
}

pub fn hydration_interval(maintenance_active: bool) -> Duration {
    if maintenance_active {
        Duration::minutes(MAINTENANCE_HYDRATION_INTERVAL_MINUTES)
    } else {
        Duration::minutes(HYDRATION_INTERVAL_MINUTES)
    }
}

/// Compute every future notification for `fast` as of `now`.
pub fn plan(
    fast: &ActiveFast,
    protocol: &Protocol,
    prefs: &NotificationPreferences,
    maintenance_active: bool,
    now: DateTime<Utc>,
) -> Vec<NotificationDescriptor> {
    let mut out = Vec::new();
    let planned_end = fast.planned_end_time;

    if prefs.fast_ending {
        let lead_hours = if protocol.notification_lead_hours > 0.0 {
            protocol.notification_lead_hours
        } else {
            FALLBACK_LEAD_HOURS
        };
        let warn_at = planned_end - hours(lead_hours);
        if warn_at > now {
            out.push(descriptor(
                FAST_ENDING_SOON_ID,
                NotificationCategory::FastEndingSoon,
                "\u{23f0} Fast Ending Soon".into(),
                format!(
                    "Your {} fast ends in {} hour(s)",
                    protocol.display_name, lead_hours
                ),
                warn_at,
            ));
        }

        if planned_end > now {
            out.push(descriptor(
                FAST_COMPLETE_ID,
                NotificationCategory::FastComplete,
                "\u{1f389} Planned Fast Complete!".into(),
                format!(
                    "{}h fast complete! You can continue or stop now.",
                    fast.fast_duration_hours
                ),
                planned_end,
            ));
        }
    }

    if prefs.water_reminders {
        let interval = hydration_interval(maintenance_active);
        let mut at = fast.start_time + interval;
        let mut slot = 0;
        // Slots are walked from the start of the fast so ids stay stable
        // across replans; past slots are skipped, not renumbered.
        while at < planned_end && slot < MAX_HYDRATION_REMINDERS {
            if at > now {
                out.push(descriptor(
                    HYDRATION_BASE_ID + slot,
                    NotificationCategory::Hydration,
                    "\u{1f4a7} Hydration Reminder".into(),
                    "Time to drink water! Stay hydrated during your fast.".into(),
                    at,
                ));
            }
            at += interval;
            slot += 1;
        }
    }

    if prefs.phase_transitions && !maintenance_active {
        let upcoming = PHASES
            .iter()
            .map(|phase| (phase, fast.start_time + hours(phase.start_hour)))
            .filter(|(_, at)| *at > now && *at < planned_end)
            .take(MAX_PHASE_REMINDERS as usize);
        for (offset, (phase, at)) in (0u32..).zip(upcoming) {
            out.push(descriptor(
                PHASE_BASE_ID + offset,
                NotificationCategory::PhaseTransition,
                format!("\u{2728} New Phase: {}", phase.display_title),
                phase.short_summary.to_string(),
                at,
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::{get_protocol, Protocol};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap()
    }

    fn sixteen_hour_fast() -> ActiveFast {
        ActiveFast::new(get_protocol("16_8"), 16.0, "dev".into(), t0())
    }

    fn with_lead(lead: f64) -> Protocol {
        Protocol {
            notification_lead_hours: lead,
            ..get_protocol("16_8").clone()
        }
    }

    fn all_on() -> NotificationPreferences {
        NotificationPreferences {
            phase_transitions: true,
            ..NotificationPreferences::default()
        }
    }

    fn ids(plan: &[NotificationDescriptor]) -> Vec<u32> {
        plan.iter().map(|n| n.id).collect()
    }

    #[test]
    fn fresh_fast_with_defaults() {
        let fast = sixteen_hour_fast();
        let plan = plan(&fast, get_protocol("16_8"), &NotificationPreferences::default(), false, t0());

        let ending = &plan[0];
        assert_eq!(ending.id, FAST_ENDING_SOON_ID);
        assert_eq!(ending.fire_at, t0() + Duration::hours(14));
        assert_eq!(ending.body, "Your 16 / 8 fast ends in 2 hour(s)");

        let complete = &plan[1];
        assert_eq!(complete.id, FAST_COMPLETE_ID);
        assert_eq!(complete.fire_at, fast.planned_end_time);
        assert_eq!(complete.body, "16h fast complete! You can continue or stop now.");

        // Hourly from +1h while strictly before +16h.
        let water: Vec<_> = plan.iter().filter(|n| n.category == NotificationCategory::Hydration).collect();
        assert_eq!(water.len(), 15);
        assert_eq!(water[0].id, 100);
        assert_eq!(water[0].fire_at, t0() + Duration::hours(1));
        assert_eq!(water[14].fire_at, t0() + Duration::hours(15));

        // Phase transitions are off by default.
        assert!(plan.iter().all(|n| n.category != NotificationCategory::PhaseTransition));
    }

    #[test]
    fn ending_soon_included_only_while_future() {
        let fast = sixteen_hour_fast();
        let protocol = with_lead(1.0);
        let prefs = NotificationPreferences::default();

        let before = plan(&fast, &protocol, &prefs, false, t0() + Duration::hours(15) - Duration::seconds(1));
        assert_eq!(before[0].id, FAST_ENDING_SOON_ID);
        assert_eq!(before[0].fire_at, t0() + Duration::hours(15));

        let after = plan(&fast, &protocol, &prefs, false, t0() + Duration::hours(15));
        assert!(!ids(&after).contains(&FAST_ENDING_SOON_ID));
        assert!(ids(&after).contains(&FAST_COMPLETE_ID));
    }

    #[test]
    fn zero_lead_uses_one_hour() {
        let fast = sixteen_hour_fast();
        let plan = plan(&fast, &with_lead(0.0), &NotificationPreferences::default(), false, t0());
        assert_eq!(plan[0].fire_at, t0() + Duration::hours(15));
    }

    #[test]
    fn nothing_after_planned_end() {
        let fast = sixteen_hour_fast();
        let plan = plan(&fast, get_protocol("16_8"), &all_on(), false, fast.planned_end_time);
        assert!(plan.is_empty());
    }

    #[test]
    fn hydration_ids_stay_stable_mid_fast() {
        let fast = sixteen_hour_fast();
        let now = t0() + Duration::minutes(150);
        let plan = plan(&fast, get_protocol("16_8"), &NotificationPreferences::default(), false, now);
        let water: Vec<_> = plan.iter().filter(|n| n.category == NotificationCategory::Hydration).collect();
        // Slots at +1h and +2h have passed; +3h keeps slot id 102.
        assert_eq!(water[0].id, 102);
        assert_eq!(water[0].fire_at, t0() + Duration::hours(3));
    }

    #[test]
    fn hydration_is_capped() {
        let protocol = get_protocol("24_plus");
        let fast = ActiveFast::new(protocol, 72.0, "dev".into(), t0());
        let plan = plan(&fast, protocol, &NotificationPreferences::default(), false, t0());
        let water: Vec<_> = plan.iter().filter(|n| n.category == NotificationCategory::Hydration).collect();
        assert_eq!(water.len(), MAX_HYDRATION_REMINDERS as usize);
        assert_eq!(water.last().unwrap().id, 123);
    }

    #[test]
    fn maintenance_mode_halves_hydration_and_silences_phases() {
        let fast = sixteen_hour_fast();
        let plan = plan(&fast, get_protocol("16_8"), &all_on(), true, t0());
        let water: Vec<_> = plan.iter().filter(|n| n.category == NotificationCategory::Hydration).collect();
        assert_eq!(water.len(), 7);
        assert_eq!(water[0].fire_at, t0() + Duration::hours(2));
        assert!(plan.iter().all(|n| n.category != NotificationCategory::PhaseTransition));
    }

    #[test]
    fn phase_transitions_strictly_inside_window() {
        let fast = sixteen_hour_fast();
        let now = t0() + Duration::hours(4);
        let plan = plan(&fast, get_protocol("16_8"), &all_on(), false, now);
        let phases: Vec<_> = plan
            .iter()
            .filter(|n| n.category == NotificationCategory::PhaseTransition)
            .collect();
        // +4h is not after now, +16h is not before the planned end.
        assert_eq!(phases.len(), 2);
        assert_eq!((phases[0].id, phases[0].fire_at), (200, t0() + Duration::hours(8)));
        assert_eq!(phases[0].title, "\u{2728} New Phase: Insulin Decline");
        assert_eq!((phases[1].id, phases[1].fire_at), (201, t0() + Duration::hours(12)));
    }

    #[test]
    fn preferences_gate_each_category() {
        let fast = sixteen_hour_fast();
        let prefs = NotificationPreferences {
            fast_ending: false,
            water_reminders: false,
            phase_transitions: false,
            ..NotificationPreferences::default()
        };
        assert!(plan(&fast, get_protocol("16_8"), &prefs, false, t0()).is_empty());
    }

    #[test]
    fn planning_is_idempotent() {
        let fast = sixteen_hour_fast();
        let now = t0() + Duration::minutes(37);
        let a = plan(&fast, get_protocol("16_8"), &all_on(), false, now);
        let b = plan(&fast, get_protocol("16_8"), &all_on(), false, now);
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn ids_are_unique_and_in_their_category_range() {
        let protocol = get_protocol("24_plus");
        let fast = ActiveFast::new(protocol, 80.0, "dev".into(), t0());
        let plan = plan(&fast, protocol, &all_on(), false, t0());
        let mut seen = std::collections::HashSet::new();
        for n in &plan {
            assert!(seen.insert(n.id), "duplicate id {}", n.id);
            assert!(n.category.id_range().contains(&n.id));
        }
    }
}
