//! Streak computation over a sparse check-in history.
//!
//! A streak is a run of consecutive calendar days whose status keeps the
//! habit alive (`done` or `partial`). A `failed` day or a day with no
//! record at all breaks the run. Walks are unbounded: a long unbroken
//! history counts in full, not just the visible week.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};

use crate::model::CheckinStatus;

/// Streak lengths at which the user earns a new badge, with the badge.
pub const ACHIEVEMENT_LADDER: [(i64, &str); 6] = [
    (3, "🙂"),
    (7, "😌"),
    (14, "😎"),
    (30, "🤩"),
    (60, "🔥"),
    (100, "👑"),
];

/// Length of the streak ending at `anchor`, walking backward day by day.
///
/// The anchor day itself must be recorded and alive for the streak to be
/// non-zero.
pub fn current_streak(history: &BTreeMap<NaiveDate, CheckinStatus>, anchor: NaiveDate) -> i64 {
    let mut streak = 0;
    let mut day = anchor;
    while let Some(status) = history.get(&day) {
        if !status.extends_streak() {
            break;
        }
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}

/// Streak anchored at the most recent recorded day.
///
/// Used by the streak view, where "current" means "as of the last time
/// you checked in" rather than "as of today".
pub fn streak_from_last_entry(history: &BTreeMap<NaiveDate, CheckinStatus>) -> i64 {
    match history.keys().next_back() {
        Some(last) => current_streak(history, *last),
        None => 0,
    }
}

/// Badge for a streak length, if it has reached any rung of the ladder.
pub fn achievement_emoji(streak: i64) -> Option<&'static str> {
    ACHIEVEMENT_LADDER
        .iter()
        .rev()
        .find(|(threshold, _)| streak >= *threshold)
        .map(|(_, emoji)| *emoji)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn history(entries: &[(u32, CheckinStatus)]) -> BTreeMap<NaiveDate, CheckinStatus> {
        entries.iter().map(|(d, s)| (day(*d), *s)).collect()
    }

    #[test]
    fn test_streak_stops_at_failed_day() {
        let h = history(&[
            (7, CheckinStatus::Done),
            (8, CheckinStatus::Done),
            (9, CheckinStatus::Failed),
            (10, CheckinStatus::Done),
        ]);
        assert_eq!(current_streak(&h, day(10)), 1);
    }

    #[test]
    fn test_partial_extends_streak() {
        let h = history(&[
            (8, CheckinStatus::Done),
            (9, CheckinStatus::Partial),
            (10, CheckinStatus::Done),
        ]);
        assert_eq!(current_streak(&h, day(10)), 3);
    }

    #[test]
    fn test_empty_history_is_zero() {
        let h = BTreeMap::new();
        assert_eq!(current_streak(&h, day(10)), 0);
        assert_eq!(streak_from_last_entry(&h), 0);
    }

    #[test]
    fn test_gap_breaks_streak() {
        let h = history(&[
            (7, CheckinStatus::Done),
            (9, CheckinStatus::Done),
            (10, CheckinStatus::Done),
        ]);
        assert_eq!(current_streak(&h, day(10)), 2);
    }

    #[test]
    fn test_unrecorded_anchor_is_zero() {
        let h = history(&[(9, CheckinStatus::Done)]);
        assert_eq!(current_streak(&h, day(10)), 0);
    }

    #[test]
    fn test_walk_is_not_capped_at_a_week() {
        let h: BTreeMap<NaiveDate, CheckinStatus> =
            (1..=20).map(|d| (day(d), CheckinStatus::Done)).collect();
        assert_eq!(current_streak(&h, day(20)), 20);
    }

    #[test]
    fn test_last_entry_anchor_ignores_later_silence() {
        // Nothing recorded on the 9th or 10th; the view still reports the
        // streak as of the 8th.
        let h = history(&[
            (7, CheckinStatus::Done),
            (8, CheckinStatus::Done),
        ]);
        assert_eq!(streak_from_last_entry(&h), 2);
    }

    #[test]
    fn test_achievement_ladder_rungs() {
        assert_eq!(achievement_emoji(0), None);
        assert_eq!(achievement_emoji(2), None);
        assert_eq!(achievement_emoji(3), Some("🙂"));
        assert_eq!(achievement_emoji(6), Some("🙂"));
        assert_eq!(achievement_emoji(7), Some("😌"));
        assert_eq!(achievement_emoji(29), Some("😎"));
        assert_eq!(achievement_emoji(30), Some("🤩"));
        assert_eq!(achievement_emoji(99), Some("🔥"));
        assert_eq!(achievement_emoji(250), Some("👑"));
    }
}
