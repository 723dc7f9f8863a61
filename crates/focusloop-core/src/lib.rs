//! # Focusloop Core Library
//!
//! This library provides the core business logic for the Focusloop
//! accountability bot: one small habit per user, a morning nudge, an
//! evening check-in, and weekly stats. It is transport-free; the
//! Telegram daemon in `focusloop-bot` is a thin delivery layer over
//! the same core library.
//!
//! ## Architecture
//!
//! - **Storage**: SQLite-based state (users, focuses, check-ins,
//!   onboarding sessions) and TOML-based configuration
//! - **Timezone**: a fixed table of selectable zones; reminder times are
//!   stored on a canonical UTC clock and converted per user
//! - **Scheduler**: pure planning passes that decide who is due for a
//!   reminder right now, leaving delivery to the caller
//! - **Stats**: trailing-week aggregates and unbounded streak walks
//!
//! ## Key Components
//!
//! - [`Database`]: state persistence
//! - [`OnboardingSession`]: the guided setup conversation
//! - [`scheduler::plan_morning`] / [`scheduler::plan_evening`]: reminder passes
//! - [`stats::week_report`] / [`stats::streak_report`]: progress views

pub mod model;
pub mod storage;
pub mod timezone;
pub mod onboarding;
pub mod scheduler;
pub mod stats;
pub mod error;

pub use model::{ChatId, CheckinStatus, Focus, FocusId, ReminderMark, User, UserId};
pub use storage::{CheckinRecorded, Config, Database};
pub use onboarding::{CompletedOnboarding, OnboardingSession, OnboardingState, StepOutcome};
pub use scheduler::{EveningKind, EveningNudge, EveningPass, MorningNudge, MorningPass};
pub use stats::{StreakReport, WeekReport, WeekStats};
pub use error::{ConfigError, CoreError, DatabaseError, Result};
