//! Statistics module for focusloop
//!
//! This module computes everything the weekly and streak views show:
//! trailing-week aggregates, streak walks, the achievement ladder, and
//! the report assembly that reads storage and persists best-streak
//! records.

mod streaks;
mod weekly;

pub use streaks::{
    achievement_emoji, current_streak, streak_from_last_entry, ACHIEVEMENT_LADDER,
};
pub use weekly::{slot_emoji, WeekStats, BAR_SEGMENTS};

use chrono::{DateTime, Duration, Utc};

use crate::error::{CoreError, Result};
use crate::model::ChatId;
use crate::storage::Database;
use crate::timezone;

/// Everything the weekly view needs, computed in one pass.
#[derive(Debug, Clone)]
pub struct WeekReport {
    /// Active focus title
    pub focus_title: String,

    /// Window counts and day slots
    pub stats: WeekStats,

    /// Streak ending today (user-local)
    pub streak: i64,

    /// High-water mark after this report's update
    pub best_streak: i64,

    /// All seven days done, nothing partial or failed
    pub perfect_week: bool,
}

/// Everything the streak view needs.
#[derive(Debug, Clone)]
pub struct StreakReport {
    /// Active focus title
    pub focus_title: String,

    /// Streak as of the most recent recorded day
    pub current: i64,

    /// Best streak on record (display only, not persisted here)
    pub best: i64,

    /// Badge for the current streak, if any rung is reached
    pub achievement: Option<&'static str>,
}

/// Build the weekly report for a user's active focus.
///
/// Walks the full history for the streak, and persists a new best-streak
/// record when today's streak beats the stored one.
///
/// # Errors
/// `UserNotOnboarded` / `NoActiveFocus` when the preconditions fail, and
/// `NoDataForPeriod` when the window holds no check-ins at all.
pub fn week_report(db: &Database, chat_id: ChatId, now: DateTime<Utc>) -> Result<WeekReport> {
    let user = db
        .user_by_chat(chat_id)?
        .ok_or(CoreError::UserNotOnboarded)?;
    if !user.is_onboarded() {
        return Err(CoreError::UserNotOnboarded);
    }
    let focus = db.active_focus(chat_id)?.ok_or(CoreError::NoActiveFocus)?;

    let zone = timezone::zone_or_default(&user.timezone);
    let today = timezone::local_today(now, zone);

    let window = db.statuses_in_range(user.id, focus.id, today - Duration::days(6), today)?;
    let stats = WeekStats::from_window(&window, today);
    if stats.recorded_total() == 0 {
        return Err(CoreError::NoDataForPeriod);
    }

    let history = db.checkin_history(user.id, focus.id)?;
    let streak = current_streak(&history, today);
    db.update_best_streak(focus.id, streak)?;
    let best_streak = focus.best_streak.max(streak);

    let perfect_week = stats.done == 7;

    Ok(WeekReport {
        focus_title: focus.title,
        stats,
        streak,
        best_streak,
        perfect_week,
    })
}

/// Build the streak report for a user's active focus.
///
/// Anchored at the last recorded day, so a user who checks in after a
/// quiet stretch still sees the streak they left off with. Does not
/// persist anything.
pub fn streak_report(db: &Database, chat_id: ChatId) -> Result<StreakReport> {
    let user = db
        .user_by_chat(chat_id)?
        .ok_or(CoreError::UserNotOnboarded)?;
    if !user.is_onboarded() {
        return Err(CoreError::UserNotOnboarded);
    }
    let focus = db.active_focus(chat_id)?.ok_or(CoreError::NoActiveFocus)?;

    let history = db.checkin_history(user.id, focus.id)?;
    let current = streak_from_last_entry(&history);
    let best = focus.best_streak.max(current);

    Ok(StreakReport {
        focus_title: focus.title,
        current,
        best,
        achievement: achievement_emoji(current),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CheckinStatus, ReminderMark};
    use crate::storage::ProfileRecord;
    use chrono::{NaiveDate, TimeZone};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn onboarded(db: &Database) {
        db.create_user(42, at(1, 9)).unwrap();
        db.update_profile(
            42,
            &ProfileRecord {
                name: "Lena".to_string(),
                timezone: "Europe/Moscow".to_string(),
                morning_utc: "05:30".to_string(),
                evening_utc: "18:30".to_string(),
                started_on: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                last_morning_sent: None,
                last_evening_sent: None,
            },
        )
        .unwrap();
        db.set_focus(42, "morning stretch", "Health", at(1, 9)).unwrap();
    }

    #[test]
    fn week_report_aggregates_and_persists_best() {
        let db = Database::open_memory().unwrap();
        onboarded(&db);

        for (day, status) in [
            (14, CheckinStatus::Done),
            (15, CheckinStatus::Partial),
            (16, CheckinStatus::Done),
        ] {
            db.record_checkin(42, status, at(day, 9)).unwrap();
        }

        let report = week_report(&db, 42, at(16, 9)).unwrap();
        assert_eq!(report.focus_title, "morning stretch");
        assert_eq!(report.stats.done, 2);
        assert_eq!(report.stats.partial, 1);
        assert_eq!(report.streak, 3);
        assert_eq!(report.best_streak, 3);
        assert!(!report.perfect_week);

        // The record survives a streak-breaking day
        db.record_checkin(42, CheckinStatus::Failed, at(17, 9)).unwrap();
        db.record_checkin(42, CheckinStatus::Done, at(18, 9)).unwrap();
        let report = week_report(&db, 42, at(18, 9)).unwrap();
        assert_eq!(report.streak, 1);
        assert_eq!(report.best_streak, 3);
    }

    #[test]
    fn week_report_streak_walks_past_the_window() {
        let db = Database::open_memory().unwrap();
        onboarded(&db);

        // Ten consecutive done days ending on the 16th
        for day in 7..=16 {
            db.record_checkin(42, CheckinStatus::Done, at(day, 9)).unwrap();
        }

        let report = week_report(&db, 42, at(16, 9)).unwrap();
        assert_eq!(report.stats.recorded_total(), 7);
        assert_eq!(report.streak, 10);
    }

    #[test]
    fn week_report_requires_data_in_window() {
        let db = Database::open_memory().unwrap();
        onboarded(&db);

        let err = week_report(&db, 42, at(16, 9)).unwrap_err();
        assert!(matches!(err, CoreError::NoDataForPeriod));

        // A record from long before the window does not help
        db.record_checkin(42, CheckinStatus::Done, at(2, 9)).unwrap();
        let err = week_report(&db, 42, at(16, 9)).unwrap_err();
        assert!(matches!(err, CoreError::NoDataForPeriod));
    }

    #[test]
    fn week_report_flags_perfect_week() {
        let db = Database::open_memory().unwrap();
        onboarded(&db);

        for day in 10..=16 {
            db.record_checkin(42, CheckinStatus::Done, at(day, 9)).unwrap();
        }

        let report = week_report(&db, 42, at(16, 9)).unwrap();
        assert_eq!(report.stats.done, 7);
        assert!(report.perfect_week);
    }

    #[test]
    fn week_report_gates_on_user_and_focus() {
        let db = Database::open_memory().unwrap();
        let err = week_report(&db, 42, at(16, 9)).unwrap_err();
        assert!(matches!(err, CoreError::UserNotOnboarded));
    }

    #[test]
    fn streak_report_uses_last_recorded_day() {
        let db = Database::open_memory().unwrap();
        onboarded(&db);

        db.record_checkin(42, CheckinStatus::Done, at(9, 9)).unwrap();
        db.record_checkin(42, CheckinStatus::Done, at(10, 9)).unwrap();

        // Days later with nothing recorded since
        let report = streak_report(&db, 42).unwrap();
        assert_eq!(report.current, 2);
        assert_eq!(report.best, 2);
        assert_eq!(report.achievement, None);
    }

    #[test]
    fn streak_report_shows_stored_best_without_persisting() {
        let db = Database::open_memory().unwrap();
        onboarded(&db);
        let focus = db.active_focus(42).unwrap().unwrap();
        db.update_best_streak(focus.id, 9).unwrap();

        db.record_checkin(42, CheckinStatus::Done, at(16, 9)).unwrap();

        let report = streak_report(&db, 42).unwrap();
        assert_eq!(report.current, 1);
        assert_eq!(report.best, 9);

        // And the view itself never writes
        let stored = db.active_focus(42).unwrap().unwrap().best_streak;
        assert_eq!(stored, 9);
    }

    #[test]
    fn streak_report_reports_badges() {
        let db = Database::open_memory().unwrap();
        onboarded(&db);

        for day in 10..=16 {
            db.record_checkin(42, CheckinStatus::Done, at(day, 9)).unwrap();
        }

        let report = streak_report(&db, 42).unwrap();
        assert_eq!(report.current, 7);
        assert_eq!(report.achievement, Some("😌"));
    }

    #[test]
    fn reminder_marks_do_not_disturb_reports() {
        let db = Database::open_memory().unwrap();
        onboarded(&db);
        db.record_checkin(42, CheckinStatus::Done, at(16, 9)).unwrap();

        let user = db.user_by_chat(42).unwrap().unwrap();
        db.mark_evening_sent(&[ReminderMark {
            user_id: user.id,
            date: NaiveDate::from_ymd_opt(2024, 3, 16).unwrap(),
        }])
        .unwrap();

        let report = week_report(&db, 42, at(16, 9)).unwrap();
        assert_eq!(report.stats.done, 1);
    }
}
