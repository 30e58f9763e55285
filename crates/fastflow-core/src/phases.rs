//! Metabolic phase table.
//!
//! Phases are keyed solely on elapsed fasting hours and keep advancing
//! regardless of which protocol the fast was started with. The table is
//! contiguous and its last entry is unbounded, so [`detect_phase`] is total.

use serde::Serialize;

/// One metabolic stage of a fast, covering `[start_hour, end_hour)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Phase {
    pub id: &'static str,
    pub start_hour: f64,
    /// `f64::INFINITY` for the last phase.
    pub end_hour: f64,
    pub display_title: &'static str,
    pub short_summary: &'static str,
    pub metabolic_state: &'static str,
    pub has_autophagy: bool,
}

impl Phase {
    pub fn contains(&self, elapsed_hours: f64) -> bool {
        elapsed_hours >= self.start_hour && elapsed_hours < self.end_hour
    }

    pub fn is_unbounded(&self) -> bool {
        self.end_hour.is_infinite()
    }
}

pub static PHASES: [Phase; 9] = [
    Phase {
        id: "fed_state",
        start_hour: 0.0,
        end_hour: 4.0,
        display_title: "Fed State",
        short_summary: "Body actively digesting food and storing energy",
        metabolic_state: "Storage mode - insulin elevated, fat storage active",
        has_autophagy: false,
    },
    Phase {
        id: "post_absorptive",
        start_hour: 4.0,
        end_hour: 8.0,
        display_title: "Post-Absorptive",
        short_summary: "Digestion complete, transitioning to stored energy",
        metabolic_state: "Early transition - insulin declining, glucagon rising",
        has_autophagy: false,
    },
    Phase {
        id: "insulin_decline",
        start_hour: 8.0,
        end_hour: 12.0,
        display_title: "Insulin Decline",
        short_summary: "Insulin drops, fat burning begins",
        metabolic_state: "Fat mobilization starting - glycogen still primary fuel",
        has_autophagy: false,
    },
    Phase {
        id: "glycogen_utilization",
        start_hour: 12.0,
        end_hour: 16.0,
        display_title: "Glycogen Utilization",
        short_summary: "Liver glycogen actively depleting",
        metabolic_state: "Glycogen depletion accelerating - ketone production beginning",
        has_autophagy: false,
    },
    Phase {
        id: "glycogen_waning",
        start_hour: 16.0,
        end_hour: 20.0,
        display_title: "Glycogen Waning",
        short_summary: "Glycogen nearly depleted, ketones rising",
        metabolic_state: "Ketone transition - fat becoming primary fuel",
        has_autophagy: true,
    },
    Phase {
        id: "early_ketosis",
        start_hour: 20.0,
        end_hour: 24.0,
        display_title: "Early Ketosis",
        short_summary: "Entering ketosis, fat-dominant metabolism",
        metabolic_state: "Ketosis establishing - brain using ketones for fuel",
        has_autophagy: true,
    },
    Phase {
        id: "established_ketosis",
        start_hour: 24.0,
        end_hour: 48.0,
        display_title: "Established Ketosis",
        short_summary: "Deep ketosis, autophagy active",
        metabolic_state: "Full ketosis - autophagy intensifying, cellular cleanup active",
        has_autophagy: true,
    },
    Phase {
        id: "extended_fasting",
        start_hour: 48.0,
        end_hour: 72.0,
        display_title: "Extended Fasting",
        short_summary: "Deep autophagy, immune renewal",
        metabolic_state: "Stem cell activation, immune system regeneration",
        has_autophagy: true,
    },
    Phase {
        id: "regenerative",
        start_hour: 72.0,
        end_hour: f64::INFINITY,
        display_title: "Regenerative (72+ hours)",
        short_summary: "Multi-day fasting, deep cellular renewal",
        metabolic_state: "Advanced regenerative state - medical supervision required",
        has_autophagy: true,
    },
];

/// Index into [`PHASES`] of the phase covering `elapsed_hours`.
///
/// Negative or NaN input (clock skew, corrupt start time) maps to the first
/// phase.
pub fn phase_index(elapsed_hours: f64) -> usize {
    PHASES
        .iter()
        .position(|p| p.contains(elapsed_hours))
        .unwrap_or(0)
}

/// Phase covering `elapsed_hours`.
pub fn detect_phase(elapsed_hours: f64) -> &'static Phase {
    &PHASES[phase_index(elapsed_hours)]
}

pub fn phase_by_id(id: &str) -> Option<&'static Phase> {
    PHASES.iter().find(|p| p.id == id)
}

/// "Phase 3 of 9 • Insulin Decline"
pub fn phase_progress_string(elapsed_hours: f64) -> String {
    let index = phase_index(elapsed_hours);
    format!(
        "Phase {} of {} \u{2022} {}",
        index + 1,
        PHASES.len(),
        PHASES[index].display_title
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn table_is_contiguous_and_sorted() {
        assert_eq!(PHASES[0].start_hour, 0.0);
        for pair in PHASES.windows(2) {
            assert_eq!(pair[0].end_hour, pair[1].start_hour, "{} -> {}", pair[0].id, pair[1].id);
            assert!(pair[0].start_hour < pair[0].end_hour);
        }
        assert!(PHASES.last().unwrap().is_unbounded());
    }

    #[test]
    fn boundaries_belong_to_the_later_phase() {
        assert_eq!(detect_phase(0.0).id, "fed_state");
        assert_eq!(detect_phase(3.999).id, "fed_state");
        assert_eq!(detect_phase(4.0).id, "post_absorptive");
        assert_eq!(detect_phase(16.0).id, "glycogen_waning");
        assert_eq!(detect_phase(17.0).id, "glycogen_waning");
        assert_eq!(detect_phase(24.0).id, "established_ketosis");
        assert_eq!(detect_phase(72.0).id, "regenerative");
        assert_eq!(detect_phase(10_000.0).id, "regenerative");
    }

    #[test]
    fn out_of_range_input_maps_to_first_phase() {
        assert_eq!(detect_phase(-1.0).id, "fed_state");
        assert_eq!(detect_phase(f64::NAN).id, "fed_state");
    }

    #[test]
    fn progress_string() {
        assert_eq!(phase_progress_string(9.0), "Phase 3 of 9 \u{2022} Insulin Decline");
    }

    #[test]
    fn lookup_by_id() {
        assert_eq!(phase_by_id("early_ketosis").map(|p| p.start_hour), Some(20.0));
        assert!(phase_by_id("nope").is_none());
    }

    proptest! {
        #[test]
        fn every_non_negative_hour_has_exactly_one_phase(h in 0.0f64..10_000.0) {
            let matching = PHASES.iter().filter(|p| p.contains(h)).count();
            prop_assert_eq!(matching, 1);
            let phase = detect_phase(h);
            prop_assert!(phase.start_hour <= h && h < phase.end_hour);
        }

        #[test]
        fn different_ranges_give_different_ids(a in 0.0f64..200.0, b in 0.0f64..200.0) {
            if phase_index(a) != phase_index(b) {
                prop_assert_ne!(detect_phase(a).id, detect_phase(b).id);
            }
        }
    }
}
