//! Domain records shared across the library.
//!
//! These mirror the rows in storage: a user profile, the focus habit it
//! tracks, and the daily check-ins recorded against that focus.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Internal user row id.
pub type UserId = i64;

/// Telegram chat id (also the stable external user identity).
pub type ChatId = i64;

/// Internal focus row id.
pub type FocusId = i64;

/// Outcome of a single day against the active focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckinStatus {
    /// The habit happened as planned.
    Done,
    /// Some progress, short of the full habit.
    Partial,
    /// The day passed without the habit.
    Failed,
}

impl CheckinStatus {
    /// Storage representation, stable across schema versions.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckinStatus::Done => "done",
            CheckinStatus::Partial => "partial",
            CheckinStatus::Failed => "failed",
        }
    }

    /// Parse the storage representation back into a status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "done" => Some(CheckinStatus::Done),
            "partial" => Some(CheckinStatus::Partial),
            "failed" => Some(CheckinStatus::Failed),
            _ => None,
        }
    }

    /// Whether this status keeps a streak alive.
    pub fn extends_streak(&self) -> bool {
        matches!(self, CheckinStatus::Done | CheckinStatus::Partial)
    }
}

/// A registered user and their reminder profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Internal row id
    pub id: UserId,

    /// Telegram chat this user talks to us from
    pub chat_id: ChatId,

    /// Display name collected during onboarding; empty until then
    pub name: String,

    /// IANA-style zone name from the fixed zone table
    pub timezone: String,

    /// Morning reminder, canonical UTC "HH:MM"
    pub morning_utc: Option<String>,

    /// Evening reminder, canonical UTC "HH:MM"
    pub evening_utc: Option<String>,

    /// Local date the profile was completed; None while onboarding
    pub started_on: Option<NaiveDate>,

    /// Local date the morning reminder last fired (or was suppressed)
    pub last_morning_sent: Option<NaiveDate>,

    /// Local date the evening reminder last fired
    pub last_evening_sent: Option<NaiveDate>,

    /// Row creation timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A user counts as onboarded once the profile is stamped complete.
    pub fn is_onboarded(&self) -> bool {
        self.started_on.is_some()
    }
}

/// A focus habit. At most one per user is active at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Focus {
    /// Internal row id
    pub id: FocusId,

    /// Owning user
    pub user_id: UserId,

    /// Short habit phrase, e.g. "stretch every morning"
    pub title: String,

    /// Life area the habit belongs to
    pub domain: String,

    /// Whether this is the user's current focus
    pub is_active: bool,

    /// High-water mark of consecutive kept days
    pub best_streak: i64,

    /// When the focus was set
    pub started_at: DateTime<Utc>,

    /// When the focus was replaced; None while active
    pub ended_at: Option<DateTime<Utc>>,
}

/// A reminder-sent marker to persist after a delivery attempt succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderMark {
    /// User whose marker to stamp
    pub user_id: UserId,

    /// User-local date the reminder covered
    pub date: NaiveDate,
}
