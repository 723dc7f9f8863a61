//! Weekly aggregate over the trailing 7-day window.
//!
//! The window is the 7 user-local calendar days ending "today". Days with
//! no record are blank: they are excluded from the completion denominator
//! rather than counted as zero, so two recorded days that both went well
//! still read as 100%.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};

use crate::model::CheckinStatus;

/// Number of segments in the completion bar.
pub const BAR_SEGMENTS: usize = 10;

/// Counts and day-by-day view of the trailing week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekStats {
    /// Days recorded as done
    pub done: u32,

    /// Days recorded as partial
    pub partial: u32,

    /// Days recorded as failed
    pub failed: u32,

    /// The 7 window days oldest to newest; None where nothing was recorded
    pub days: [Option<CheckinStatus>; 7],
}

impl WeekStats {
    /// Aggregate the window ending at `today` (inclusive).
    pub fn from_window(
        window: &BTreeMap<NaiveDate, CheckinStatus>,
        today: NaiveDate,
    ) -> Self {
        let mut days = [None; 7];
        let mut done = 0;
        let mut partial = 0;
        let mut failed = 0;

        for (slot, day) in days.iter_mut().enumerate() {
            let date = today - Duration::days(6 - slot as i64);
            let status = window.get(&date).copied();
            *day = status;
            match status {
                Some(CheckinStatus::Done) => done += 1,
                Some(CheckinStatus::Partial) => partial += 1,
                Some(CheckinStatus::Failed) => failed += 1,
                None => {}
            }
        }

        Self {
            done,
            partial,
            failed,
            days,
        }
    }

    /// Days with any record in the window.
    pub fn recorded_total(&self) -> u32 {
        self.done + self.partial + self.failed
    }

    /// Weighted completion: a partial day counts as half a done day.
    fn effective_done(&self) -> f64 {
        f64::from(self.done) + f64::from(self.partial) * 0.5
    }

    /// Completion over recorded days, or None when nothing was recorded.
    pub fn completion_fraction(&self) -> Option<f64> {
        let total = self.recorded_total();
        if total == 0 {
            return None;
        }
        Some(self.effective_done() / f64::from(total))
    }

    /// Completion as a whole percent, ties rounded away from zero.
    pub fn completion_percent(&self) -> Option<u32> {
        self.completion_fraction()
            .map(|f| (f * 100.0).round() as u32)
    }

    /// How many bar segments to fill.
    pub fn filled_segments(&self) -> usize {
        match self.completion_fraction() {
            Some(f) => (f * BAR_SEGMENTS as f64).round() as usize,
            None => 0,
        }
    }

    /// Ten-segment completion bar, e.g. `████████░░`.
    pub fn bar(&self) -> String {
        let filled = self.filled_segments();
        let mut bar = "█".repeat(filled);
        bar.push_str(&"░".repeat(BAR_SEGMENTS - filled));
        bar
    }

    /// Seven emoji slots: recorded days packed to the left, blanks padded
    /// on the right. Not calendar-aligned.
    pub fn heatmap(&self) -> String {
        let mut slots: Vec<Option<CheckinStatus>> =
            self.days.iter().copied().filter(Option::is_some).collect();
        slots.resize(7, None);
        slots.into_iter().map(slot_emoji).collect()
    }
}

/// Emoji for one heatmap slot.
pub fn slot_emoji(status: Option<CheckinStatus>) -> &'static str {
    match status {
        Some(CheckinStatus::Done) => "✅",
        Some(CheckinStatus::Partial) => "🌓",
        Some(CheckinStatus::Failed) => "❌",
        None => "⬜",
    }
}
