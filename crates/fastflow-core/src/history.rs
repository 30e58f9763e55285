//! Queries and statistics over completed fasting sessions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timer::session::round_tenth;
use crate::timer::CompletedSession;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FastingStats {
    pub total_fasts: usize,
    pub total_hours: f64,
    pub average_hours: f64,
    pub longest_fast: f64,
    /// Consecutive days with a fast, counting back from the most recent one.
    pub current_streak: u32,
}

/// Newest first, by actual end time.
pub fn sorted_newest_first(sessions: &[CompletedSession]) -> Vec<CompletedSession> {
    let mut sorted = sessions.to_vec();
    sorted.sort_by(|a, b| b.actual_end_time.cmp(&a.actual_end_time));
    sorted
}

pub fn find(sessions: &[CompletedSession], fast_id: Uuid) -> Option<&CompletedSession> {
    sessions.iter().find(|s| s.fast_id == fast_id)
}

pub fn by_protocol<'a>(
    sessions: &'a [CompletedSession],
    protocol_id: &'a str,
) -> impl Iterator<Item = &'a CompletedSession> {
    sessions.iter().filter(move |s| s.protocol_id == protocol_id)
}

/// Sessions whose start date falls in `from..=to`.
pub fn in_date_range(
    sessions: &[CompletedSession],
    from: NaiveDate,
    to: NaiveDate,
) -> impl Iterator<Item = &CompletedSession> {
    sessions.iter().filter(move |s| s.date >= from && s.date <= to)
}

pub fn stats(sessions: &[CompletedSession]) -> FastingStats {
    if sessions.is_empty() {
        return FastingStats::default();
    }

    let total_hours: f64 = sessions.iter().map(|s| s.actual_duration_hours).sum();
    let longest = sessions
        .iter()
        .map(|s| s.actual_duration_hours)
        .fold(0.0, f64::max);

    FastingStats {
        total_fasts: sessions.len(),
        total_hours: round_tenth(total_hours),
        average_hours: round_tenth(total_hours / sessions.len() as f64),
        longest_fast: round_tenth(longest),
        current_streak: streak(sessions),
    }
}

/// Length of the run of consecutive calendar days ending at the most recent
/// fast. Several fasts on one day count once.
pub fn streak(sessions: &[CompletedSession]) -> u32 {
    let mut dates: Vec<NaiveDate> = sessions.iter().map(|s| s.date).collect();
    dates.sort_unstable_by(|a, b| b.cmp(a));
    dates.dedup();

    let Some(&first) = dates.first() else {
        return 0;
    };
    let mut streak = 1;
    let mut current = first;
    for &date in &dates[1..] {
        if (current - date).num_days() == 1 {
            streak += 1;
            current = date;
        } else {
            break;
        }
    }
    streak
}
