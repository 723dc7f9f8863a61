//! Every user-visible string in one place.
//!
//! Reminder texts take the user's name when one is on file; rendering
//! helpers keep casing right for the bare variants.

use focusloop_core::{CheckinRecorded, CheckinStatus, StreakReport, WeekReport};

pub const ASK_NAME: &str = "Hi 👋\nWhat's your name?";

pub const ALREADY_ONBOARDED: &str =
    "Good to see you again 👋\nYou already have a focus. /focus will show it.";

pub const ASK_MORNING_TIME: &str =
    "Got it! What time should the morning reminder come?\nFormat: HH:MM (for example 08:30)";

pub const ASK_EVENING_TIME: &str =
    "What time in the evening should we wrap up the day?\nFormat: HH:MM (for example 21:30)";

pub const BAD_TIME: &str = "Format is HH:MM. Try again.";

pub const ASK_TIMEZONE: &str = "Which timezone are you in? Pick one below.";

pub const BAD_TIMEZONE: &str = "Pick a timezone using the buttons below.";

pub const ASK_DOMAIN: &str = "Which area do we start with?";

pub const ASK_FOCUS: &str =
    "Write your small focus for the week (for example: stretch every morning)";

pub const CHECKIN_HOWTO: &str = "Use the \"Check-in 📋\" button to record your days:";

pub const RESET: &str = "Let's start over. What's your name?";

pub const NOT_ONBOARDED: &str = "Go through /start first.";

pub const CHECKIN_QUESTION: &str = "How did your day with the focus go?";

pub const FOCUS_NONE: &str = "There's no active focus right now. Go through /start to set one.";

pub const FOCUS_UPDATE_FAILED: &str =
    "Couldn't update the focus. Try again or go through /start.";

pub const FALLBACK: &str = "I didn't catch that. /help lists the commands.";

pub const SOMETHING_WENT_WRONG: &str = "Something went wrong on my side. Try again in a minute.";

pub const WEEK_NO_FOCUS: &str = indoc::indoc! {"
    No data for the current focus over the last 7 days.
    Set a focus through /start first and start recording days."};

pub const WEEK_NO_CHECKINS: &str = indoc::indoc! {"
    Not a single check-in for the current focus over the last 7 days.
    Try recording the outcome with the buttons for at least a couple of days in a row."};

pub const PERFECT_WEEK: &str = indoc::indoc! {"
    Bravo! You've closed all 7 focus days in a row 💚
    You can raise the bar or pick a new focus with the /focus command."};

pub const HELP: &str = indoc::indoc! {"
    Commands:
    /start - onboarding and first focus
    /focus - show or change the focus
    /week - weekly stats
    /streak - current streak
    /done, /partial, /fail - record today without buttons"};

/// Menu published through `setMyCommands`.
pub const COMMAND_MENU: [(&str, &str); 5] = [
    ("start", "Launch the bot and set a focus"),
    ("focus", "Show or change the focus"),
    ("week", "Weekly stats"),
    ("streak", "Current streak"),
    ("help", "List of commands"),
];

pub fn onboarding_complete(focus_title: &str, domain: &str) -> String {
    format!(
        "Great!\n\n\"{focus_title}\" in the \"{domain}\" area\n\n\
         Mornings I'll remind you about the focus, and in the evening I'll ask how the day went."
    )
}

pub fn focus_current(title: &str) -> String {
    format!(
        "Your current focus:\n\"{title}\"\n\n\
         To replace it, write the new one right after the command:\n\
         /focus read 10 pages every evening"
    )
}

pub fn focus_updated(title: &str) -> String {
    format!("Done! The new focus:\n\"{title}\"")
}

/// Short confirmation for the slash commands, without status-change detail.
pub fn quick_confirmation(status: CheckinStatus) -> &'static str {
    match status {
        CheckinStatus::Done => "Nice, today's focus is closed ✅",
        CheckinStatus::Partial => "Partial still counts as moving forward 🌓",
        CheckinStatus::Failed => "Okay, it happens. Tomorrow is another try ❌",
    }
}

/// Button reply. First record of the day gets the long form; a change
/// says what will happen to the evening summary and the stats.
pub fn checkin_reply(status: CheckinStatus, recorded: &CheckinRecorded) -> String {
    if recorded.previous.is_none() {
        let lead = match status {
            CheckinStatus::Done => "Great, the day is counted 👌",
            CheckinStatus::Partial => "Partial progress recorded 🌓",
            CheckinStatus::Failed => "Okay, it happens. We'll try again tomorrow ❌",
        };
        return format!(
            "{lead}\nIf you change your mind, just pick another button and I'll update today's status."
        );
    }
    let tail = if recorded.evening_already_sent {
        "The weekly stats have been updated."
    } else {
        "The evening summary and the stats will use this one."
    };
    format!("Today's status is now: {}\n{tail}", status_label(status))
}

fn status_label(status: CheckinStatus) -> &'static str {
    match status {
        CheckinStatus::Done => "done ✅",
        CheckinStatus::Partial => "partially done 🌓",
        CheckinStatus::Failed => "not done ❌",
    }
}

pub fn morning_nudge(name: &str, focus_title: &str) -> String {
    format!(
        "{}\n\nToday's main thing:\n\"{focus_title}\"",
        with_name(name, "new day, same focus 💡")
    )
}

pub fn evening_summary(name: &str, status: CheckinStatus) -> String {
    let body = match status {
        CheckinStatus::Done => "the focus day is closed ✅",
        CheckinStatus::Partial => "today went partially 🌓",
        CheckinStatus::Failed => "today didn't happen ❌",
    };
    with_name(name, body)
}

pub fn evening_prompt(name: &str) -> String {
    with_name(name, "how did the day with the focus go?")
}

pub fn week_report(report: &WeekReport) -> String {
    let stats = &report.stats;
    let percent = stats.completion_percent().unwrap_or(0);
    let mut text = format!(
        "Weekly slice for the focus:\n\"{}\"\n\n\
         {}  (last 7 days)\n\n\
         ✅ Done: {}\n🌓 Partial: {}\n❌ Missed: {}\n\n\
         {}  {}% over the last 7 days\n\n{}",
        report.focus_title,
        stats.heatmap(),
        stats.done,
        stats.partial,
        stats.failed,
        stats.bar(),
        percent,
        tier_line(percent),
    );
    if report.streak > 1 {
        text.push_str(&format!(
            "\n\nYou've been holding on for {} days in a row!",
            report.streak
        ));
    } else if report.streak == 1 {
        text.push_str("\n\nA great start to the streak: the first day is in the bank!");
    }
    text
}

fn tier_line(percent: u32) -> &'static str {
    match percent {
        100 => "A perfect run. Every single day went to the focus.",
        80..=99 => "Great pace. The week almost closed in full.",
        40..=79 => "A decent rhythm. A bit more consistency and it takes off.",
        1..=39 => "The start is in. Keep recording days and the picture will fill up.",
        _ => "No closed days yet. You kept the log going, and that already counts.",
    }
}

pub fn streak_report(report: &StreakReport) -> String {
    let badge = report
        .achievement
        .map(|emoji| format!(" {emoji}"))
        .unwrap_or_default();
    let mut text = format!(
        "Streak for the focus:\n\"{}\"\n\nCurrent: {} days in a row{badge}\nBest: {} days",
        report.focus_title, report.current, report.best
    );
    if report.current == 0 {
        text.push_str("\n\nRecord today with the buttons and the count starts again.");
    }
    text
}

fn with_name(name: &str, body: &str) -> String {
    if name.is_empty() {
        capitalize_first(body)
    } else {
        format!("{name}, {body}")
    }
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use focusloop_core::WeekStats;
    use std::collections::BTreeMap;

    fn recorded(previous: Option<CheckinStatus>, evening_already_sent: bool) -> CheckinRecorded {
        CheckinRecorded {
            date: NaiveDate::from_ymd_opt(2024, 3, 17).unwrap(),
            previous,
            evening_already_sent,
        }
    }

    fn week_stats(statuses: &[CheckinStatus]) -> WeekStats {
        let today = NaiveDate::from_ymd_opt(2024, 3, 17).unwrap();
        let mut window = BTreeMap::new();
        for (i, status) in statuses.iter().enumerate() {
            let back = (statuses.len() - 1 - i) as i64;
            window.insert(today - Duration::days(back), *status);
        }
        WeekStats::from_window(&window, today)
    }

    fn report_for(statuses: &[CheckinStatus], streak: i64) -> WeekReport {
        WeekReport {
            focus_title: "stretch every morning".to_string(),
            stats: week_stats(statuses),
            streak,
            best_streak: streak,
            perfect_week: false,
        }
    }

    #[test]
    fn name_prefix_keeps_casing_straight() {
        assert_eq!(
            morning_nudge("Lena", "stretch"),
            "Lena, new day, same focus 💡\n\nToday's main thing:\n\"stretch\""
        );
        assert!(morning_nudge("", "stretch").starts_with("New day, same focus 💡"));
    }

    #[test]
    fn evening_texts_cover_both_name_variants() {
        assert_eq!(
            evening_summary("Lena", CheckinStatus::Done),
            "Lena, the focus day is closed ✅"
        );
        assert_eq!(
            evening_summary("", CheckinStatus::Failed),
            "Today didn't happen ❌"
        );
        assert_eq!(evening_prompt(""), "How did the day with the focus go?");
    }

    #[test]
    fn first_checkin_of_the_day_gets_the_long_reply() {
        let text = checkin_reply(CheckinStatus::Done, &recorded(None, false));
        assert!(text.contains("the day is counted"));
        assert!(text.contains("pick another button"));
    }

    #[test]
    fn changed_checkin_says_where_the_update_lands() {
        let before_evening = checkin_reply(
            CheckinStatus::Failed,
            &recorded(Some(CheckinStatus::Done), false),
        );
        assert!(before_evening.contains("status is now: not done ❌"));
        assert!(before_evening.contains("evening summary"));

        let after_evening = checkin_reply(
            CheckinStatus::Partial,
            &recorded(Some(CheckinStatus::Done), true),
        );
        assert!(after_evening.contains("status is now: partially done 🌓"));
        assert!(after_evening.contains("stats have been updated"));
    }

    #[test]
    fn week_report_shows_counts_bar_and_percent() {
        use CheckinStatus::{Done, Partial};
        let text = week_report(&report_for(&[Done, Done, Partial, Done], 3));
        assert!(text.contains("\"stretch every morning\""));
        assert!(text.contains("✅ Done: 3"));
        assert!(text.contains("🌓 Partial: 1"));
        assert!(text.contains("❌ Missed: 0"));
        assert!(text.contains("%"));
        assert!(text.contains("█"));
        assert!(text.contains("holding on for 3 days"));
    }

    #[test]
    fn week_report_marks_the_first_streak_day() {
        let text = week_report(&report_for(&[CheckinStatus::Done], 1));
        assert!(text.contains("first day is in the bank"));
    }

    #[test]
    fn tier_lines_change_at_the_boundaries() {
        assert_ne!(tier_line(0), tier_line(1));
        assert_eq!(tier_line(1), tier_line(39));
        assert_ne!(tier_line(39), tier_line(40));
        assert_eq!(tier_line(40), tier_line(79));
        assert_ne!(tier_line(79), tier_line(80));
        assert_eq!(tier_line(80), tier_line(99));
        assert_ne!(tier_line(99), tier_line(100));
    }

    #[test]
    fn streak_view_attaches_badge_and_best() {
        let text = streak_report(&StreakReport {
            focus_title: "stretch".to_string(),
            current: 7,
            best: 9,
            achievement: Some("😌"),
        });
        assert!(text.contains("Current: 7 days in a row 😌"));
        assert!(text.contains("Best: 9 days"));

        let empty = streak_report(&StreakReport {
            focus_title: "stretch".to_string(),
            current: 0,
            best: 4,
            achievement: None,
        });
        assert!(empty.contains("count starts again"));
    }
}
