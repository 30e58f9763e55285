//! Fasting protocol catalog.
//!
//! A protocol only decides the *planned* end of a fast and the lead time of
//! the "ending soon" reminder. The timer never stops on its own, whatever the
//! protocol says.

use serde::Serialize;

pub const DEFAULT_PROTOCOL_ID: &str = "8_16";
pub const CUSTOM_PROTOCOL_ID: &str = "custom";
pub const EXTENDED_PROTOCOL_ID: &str = "24_plus";

/// Protocols allowed to break the `fasting + eating == 24` rule.
const EXEMPT_FROM_DAY_SPLIT: [&str; 2] = [CUSTOM_PROTOCOL_ID, EXTENDED_PROTOCOL_ID];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Protocol {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub fasting_hours: Option<f64>,
    pub eating_hours: Option<f64>,
    /// Hours before the planned end at which "ending soon" fires.
    /// Zero means "use the planner's default".
    pub notification_lead_hours: f64,
    pub beginner_friendly: bool,
    pub is_default: bool,
}

impl Protocol {
    /// Checks the day-split invariant. `custom` and `24_plus` always pass.
    pub fn is_valid(&self) -> bool {
        if EXEMPT_FROM_DAY_SPLIT.contains(&self.id) {
            return true;
        }
        match (self.fasting_hours, self.eating_hours) {
            (Some(fasting), Some(eating)) => fasting + eating == 24.0,
            _ => false,
        }
    }
}

pub static PROTOCOLS: [Protocol; 9] = [
    Protocol {
        id: "8_16",
        display_name: "8 / 16",
        description: "Beginner: 8 hours fasting, 16 hours eating",
        fasting_hours: Some(8.0),
        eating_hours: Some(16.0),
        notification_lead_hours: 2.0,
        beginner_friendly: true,
        is_default: true,
    },
    Protocol {
        id: "10_14",
        display_name: "10 / 14",
        description: "Beginner: 10 hours fasting, 14 hours eating",
        fasting_hours: Some(10.0),
        eating_hours: Some(14.0),
        notification_lead_hours: 1.0,
        beginner_friendly: true,
        is_default: false,
    },
    Protocol {
        id: "12_12",
        display_name: "12 / 12",
        description: "Beginner: 12 hours fasting, 12 hours eating",
        fasting_hours: Some(12.0),
        eating_hours: Some(12.0),
        notification_lead_hours: 1.0,
        beginner_friendly: true,
        is_default: false,
    },
    Protocol {
        id: "14_10",
        display_name: "14 / 10",
        description: "Intermediate: 14 hours fasting, 10 hours eating",
        fasting_hours: Some(14.0),
        eating_hours: Some(10.0),
        notification_lead_hours: 1.0,
        beginner_friendly: false,
        is_default: false,
    },
    Protocol {
        id: "16_8",
        display_name: "16 / 8",
        description: "Intermediate: 16 hours fasting, 8 hours eating",
        fasting_hours: Some(16.0),
        eating_hours: Some(8.0),
        notification_lead_hours: 2.0,
        beginner_friendly: false,
        is_default: false,
    },
    Protocol {
        id: "18_6",
        display_name: "18 / 6",
        description: "Advanced: 18 hours fasting, 6 hours eating",
        fasting_hours: Some(18.0),
        eating_hours: Some(6.0),
        notification_lead_hours: 2.0,
        beginner_friendly: false,
        is_default: false,
    },
    Protocol {
        id: "20_4",
        display_name: "20 / 4",
        description: "Advanced: 20 hours fasting, 4 hours eating",
        fasting_hours: Some(20.0),
        eating_hours: Some(4.0),
        notification_lead_hours: 2.0,
        beginner_friendly: false,
        is_default: false,
    },
    Protocol {
        id: "24_plus",
        display_name: "24+",
        description: "Extended: 24+ hours fasting",
        fasting_hours: Some(24.0),
        eating_hours: None,
        notification_lead_hours: 4.0,
        beginner_friendly: false,
        is_default: false,
    },
    Protocol {
        id: "custom",
        display_name: "Custom",
        description: "Set your own fasting schedule",
        fasting_hours: None,
        eating_hours: None,
        notification_lead_hours: 0.0,
        beginner_friendly: false,
        is_default: false,
    },
];

pub fn find_protocol(id: &str) -> Option<&'static Protocol> {
    PROTOCOLS.iter().find(|p| p.id == id)
}

pub fn default_protocol() -> &'static Protocol {
    PROTOCOLS
        .iter()
        .find(|p| p.is_default)
        .unwrap_or(&PROTOCOLS[0])
}

/// Look up a protocol, falling back to the default for unknown ids.
pub fn get_protocol(id: &str) -> &'static Protocol {
    match find_protocol(id) {
        Some(protocol) => protocol,
        None => {
            tracing::warn!(protocol_id = id, "unknown protocol, falling back to default");
            default_protocol()
        }
    }
}

pub fn beginner_protocols() -> impl Iterator<Item = &'static Protocol> {
    PROTOCOLS.iter().filter(|p| p.beginner_friendly)
}

pub fn advanced_protocols() -> impl Iterator<Item = &'static Protocol> {
    PROTOCOLS
        .iter()
        .filter(|p| !p.beginner_friendly && p.id != CUSTOM_PROTOCOL_ID)
}

/// Validate the whole catalog, logging every offender.
pub fn validate_all() -> bool {
    let mut all_valid = true;
    for protocol in PROTOCOLS.iter().filter(|p| !p.is_valid()) {
        tracing::warn!(
            protocol_id = protocol.id,
            fasting = ?protocol.fasting_hours,
            eating = ?protocol.eating_hours,
            "protocol does not split the day into 24 hours"
        );
        all_valid = false;
    }
    all_valid
}
