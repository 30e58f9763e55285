//! User-editable notification preferences and maintenance-mode state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which reminder categories the user wants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    #[serde(default = "default_true")]
    pub fast_ending: bool,
    #[serde(default = "default_true")]
    pub water_reminders: bool,
    #[serde(default)]
    pub phase_transitions: bool,
    #[serde(default = "default_true")]
    pub badges: bool,
    /// Stored for the settings screen; the planner derives the hydration
    /// interval from maintenance mode.
    #[serde(default = "default_water_interval")]
    pub water_interval_minutes: u32,
}

fn default_true() -> bool {
    true
}
fn default_water_interval() -> u32 {
    60
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            fast_ending: true,
            water_reminders: true,
            phase_transitions: false,
            badges: true,
            water_interval_minutes: default_water_interval(),
        }
    }
}

/// Maintenance mode relaxes reminder frequency and silences phase alerts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceState {
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub activated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deactivated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub activation_count: u32,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: String,
}

impl MaintenanceState {
    /// Returns `false` if already active.
    pub fn activate(&mut self, reason: Option<String>, notes: String, now: DateTime<Utc>) -> bool {
        if self.is_active {
            return false;
        }
        self.is_active = true;
        self.activated_at = Some(now);
        self.deactivated_at = None;
        self.activation_count += 1;
        self.reason = Some(reason.unwrap_or_else(|| "manual".into()));
        self.notes = notes;
        true
    }

    /// Returns `false` if not active.
    pub fn deactivate(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_active = false;
        self.deactivated_at = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_preferences_fill_defaults() {
        let prefs: NotificationPreferences =
            serde_json::from_str(r#"{"phaseTransitions":true}"#).unwrap();
        assert!(prefs.phase_transitions);
        assert!(prefs.fast_ending);
        assert!(prefs.water_reminders);
        assert_eq!(prefs.water_interval_minutes, 60);
    }

    #[test]
    fn maintenance_activation_is_idempotent() {
        let now = Utc::now();
        let mut state = MaintenanceState::default();
        assert!(state.activate(None, String::new(), now));
        assert!(!state.activate(Some("again".into()), String::new(), now));
        assert_eq!(state.activation_count, 1);
        assert_eq!(state.reason.as_deref(), Some("manual"));

        assert!(state.deactivate(now));
        assert!(!state.deactivate(now));
        assert!(state.activate(Some("goal reached".into()), "hold weight".into(), now));
        assert_eq!(state.activation_count, 2);
        assert!(state.deactivated_at.is_none());
    }
}
