//! Guided onboarding conversation for new users.
//!
//! This module provides:
//! - An explicit state machine over the six onboarding questions
//! - Persistent sessions, so a restart does not lose progress
//! - Completion effects: profile write, initial reminder markers, and
//!   the first focus
//!
//! Replies and keyboards live with the transport; this module only
//! decides what the next step is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::model::ChatId;
use crate::storage::{Database, ProfileRecord};
use crate::timezone;

/// Steps of the onboarding conversation, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnboardingState {
    /// Asking for the user's name.
    AwaitingName,
    /// Asking for the morning reminder time, local "HH:MM".
    AwaitingMorningTime,
    /// Asking for the evening check-in time, local "HH:MM".
    AwaitingEveningTime,
    /// Asking which timezone the times are in.
    AwaitingTimezone,
    /// Asking which life area the habit belongs to.
    AwaitingDomain,
    /// Asking for the habit itself.
    AwaitingFocus,
}

/// An in-flight onboarding conversation.
///
/// Times are kept exactly as the user typed them; conversion to the
/// canonical clock has to wait until the timezone answer arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingSession {
    pub state: OnboardingState,
    pub name: Option<String>,
    pub morning_local: Option<String>,
    pub evening_local: Option<String>,
    pub timezone: Option<String>,
    pub domain: Option<String>,
}

impl OnboardingSession {
    /// Start a fresh conversation at the first question.
    pub fn new() -> Self {
        Self {
            state: OnboardingState::AwaitingName,
            name: None,
            morning_local: None,
            evening_local: None,
            timezone: None,
            domain: None,
        }
    }

    /// Throw away all answers and start over.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for OnboardingSession {
    fn default() -> Self {
        Self::new()
    }
}

/// All answers from a finished conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedOnboarding {
    pub name: String,
    /// Local "HH:MM" as entered
    pub morning_local: String,
    pub evening_local: String,
    /// Stored zone name, validated against the zone table
    pub timezone: String,
    pub domain: String,
    pub focus_title: String,
}

/// Result of feeding one reply into the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Session advanced; ask the question for this state next.
    Continue(OnboardingState),
    /// Final answer received; apply with [`complete_onboarding`].
    Complete(CompletedOnboarding),
}

/// Feed one user reply into the session.
///
/// Invalid input returns an error and leaves the session exactly where
/// it was, so the caller re-asks the same question.
pub fn advance(session: &mut OnboardingSession, input: &str) -> Result<StepOutcome> {
    let text = input.trim();
    match session.state {
        OnboardingState::AwaitingName => {
            session.name = Some(text.to_string());
            session.state = OnboardingState::AwaitingMorningTime;
            Ok(StepOutcome::Continue(session.state))
        }
        OnboardingState::AwaitingMorningTime => {
            let time = timezone::parse_hhmm(text)?;
            session.morning_local = Some(timezone::format_hhmm(time));
            session.state = OnboardingState::AwaitingEveningTime;
            Ok(StepOutcome::Continue(session.state))
        }
        OnboardingState::AwaitingEveningTime => {
            let time = timezone::parse_hhmm(text)?;
            session.evening_local = Some(timezone::format_hhmm(time));
            session.state = OnboardingState::AwaitingTimezone;
            Ok(StepOutcome::Continue(session.state))
        }
        OnboardingState::AwaitingTimezone => {
            let zone = timezone::find_zone(text)
                .ok_or_else(|| CoreError::InvalidTimezoneChoice(text.to_string()))?;
            session.timezone = Some(zone.name.to_string());
            session.state = OnboardingState::AwaitingDomain;
            Ok(StepOutcome::Continue(session.state))
        }
        OnboardingState::AwaitingDomain => {
            session.domain = Some(text.to_string());
            session.state = OnboardingState::AwaitingFocus;
            Ok(StepOutcome::Continue(session.state))
        }
        OnboardingState::AwaitingFocus => Ok(StepOutcome::Complete(CompletedOnboarding {
            name: session.name.clone().unwrap_or_default(),
            morning_local: session.morning_local.clone().unwrap_or_default(),
            evening_local: session.evening_local.clone().unwrap_or_default(),
            timezone: session.timezone.clone().unwrap_or_default(),
            domain: session.domain.clone().unwrap_or_default(),
            focus_title: text.to_string(),
        })),
    }
}

/// Apply a finished conversation to storage.
///
/// Writes the profile (times converted to the canonical clock), stamps
/// reminder markers for slots already past today in the user's zone so
/// onboarding day does not start with a nag, creates the first focus,
/// and drops the session row.
pub fn complete_onboarding(
    db: &Database,
    chat_id: ChatId,
    done: &CompletedOnboarding,
    now: DateTime<Utc>,
) -> Result<()> {
    let zone = timezone::zone_or_default(&done.timezone);
    let local = timezone::local_now(now, zone);
    let today = local.date();

    let morning_time = timezone::parse_hhmm(&done.morning_local)?;
    let evening_time = timezone::parse_hhmm(&done.evening_local)?;

    let last_morning_sent = (morning_time <= local.time()).then_some(today);
    let last_evening_sent = (evening_time <= local.time()).then_some(today);

    db.update_profile(
        chat_id,
        &ProfileRecord {
            name: done.name.clone(),
            timezone: zone.name.to_string(),
            morning_utc: timezone::local_to_canonical(&done.morning_local, zone, now)?,
            evening_utc: timezone::local_to_canonical(&done.evening_local, zone, now)?,
            started_on: today,
            last_morning_sent,
            last_evening_sent,
        },
    )?;
    db.set_focus(chat_id, &done.focus_title, &done.domain, now)?;
    db.clear_session(chat_id)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn walk(session: &mut OnboardingSession, answers: &[&str]) -> Option<CompletedOnboarding> {
        for answer in answers {
            match advance(session, answer).unwrap() {
                StepOutcome::Continue(_) => {}
                StepOutcome::Complete(done) => return Some(done),
            }
        }
        None
    }

    #[test]
    fn test_full_walk_collects_all_answers() {
        let mut session = OnboardingSession::new();
        let done = walk(
            &mut session,
            &[
                "Lena",
                "08:30",
                "21:30",
                "Moscow (UTC+3)",
                "Health 🧘",
                "stretch every morning",
            ],
        )
        .unwrap();

        assert_eq!(done.name, "Lena");
        assert_eq!(done.morning_local, "08:30");
        assert_eq!(done.evening_local, "21:30");
        assert_eq!(done.timezone, "Europe/Moscow");
        assert_eq!(done.domain, "Health 🧘");
        assert_eq!(done.focus_title, "stretch every morning");
    }

    #[test]
    fn test_bad_time_keeps_state_and_answers() {
        let mut session = OnboardingSession::new();
        advance(&mut session, "Lena").unwrap();

        let err = advance(&mut session, "8:30").unwrap_err();
        assert!(matches!(err, CoreError::InvalidTimeFormat(_)));
        assert_eq!(session.state, OnboardingState::AwaitingMorningTime);
        assert_eq!(session.name.as_deref(), Some("Lena"));

        // The corrected answer goes through
        let outcome = advance(&mut session, "08:30").unwrap();
        assert_eq!(
            outcome,
            StepOutcome::Continue(OnboardingState::AwaitingEveningTime)
        );
    }

    #[test]
    fn test_bad_zone_keeps_state() {
        let mut session = OnboardingSession::new();
        walk(&mut session, &["Lena", "08:30", "21:30"]);

        let err = advance(&mut session, "Atlantis").unwrap_err();
        assert!(matches!(err, CoreError::InvalidTimezoneChoice(_)));
        assert_eq!(session.state, OnboardingState::AwaitingTimezone);

        advance(&mut session, "Asia/Irkutsk").unwrap();
        assert_eq!(session.timezone.as_deref(), Some("Asia/Irkutsk"));
    }

    #[test]
    fn test_reset_returns_to_first_question() {
        let mut session = OnboardingSession::new();
        walk(&mut session, &["Lena", "08:30", "21:30"]);

        session.reset();
        assert_eq!(session.state, OnboardingState::AwaitingName);
        assert!(session.name.is_none());
        assert!(session.morning_local.is_none());
    }

    #[test]
    fn test_session_survives_json_round_trip() {
        let mut session = OnboardingSession::new();
        walk(&mut session, &["Lena", "08:30", "21:30", "Moscow (UTC+3)"]);

        let json = serde_json::to_string(&session).unwrap();
        let restored: OnboardingSession = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, session);
        assert_eq!(restored.state, OnboardingState::AwaitingDomain);
    }

    #[test]
    fn test_completion_writes_profile_and_focus() {
        let db = crate::storage::Database::open_memory().unwrap();
        // 12:00 in Moscow on 2024-03-10
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        db.create_user(42, now).unwrap();

        let done = CompletedOnboarding {
            name: "Lena".to_string(),
            morning_local: "08:30".to_string(),
            evening_local: "21:30".to_string(),
            timezone: "Europe/Moscow".to_string(),
            domain: "Health 🧘".to_string(),
            focus_title: "stretch every morning".to_string(),
        };
        complete_onboarding(&db, 42, &done, now).unwrap();

        let user = db.user_by_chat(42).unwrap().unwrap();
        assert!(user.is_onboarded());
        assert_eq!(user.timezone, "Europe/Moscow");
        assert_eq!(user.morning_utc.as_deref(), Some("05:30"));
        assert_eq!(user.evening_utc.as_deref(), Some("18:30"));

        // Morning slot already passed at noon, evening has not
        let today = chrono::NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(user.last_morning_sent, Some(today));
        assert_eq!(user.last_evening_sent, None);

        let focus = db.active_focus(42).unwrap().unwrap();
        assert_eq!(focus.title, "stretch every morning");
        assert_eq!(focus.domain, "Health 🧘");
    }

    #[test]
    fn test_completion_clears_the_stored_session() {
        let db = crate::storage::Database::open_memory().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        db.create_user(42, now).unwrap();

        let mut session = OnboardingSession::new();
        walk(&mut session, &["Lena", "08:30", "21:30", "Moscow (UTC+3)", "Health 🧘"]);
        db.save_session(42, &session).unwrap();

        let done = match advance(&mut session, "stretch every morning").unwrap() {
            StepOutcome::Complete(done) => done,
            StepOutcome::Continue(_) => panic!("expected completion"),
        };
        complete_onboarding(&db, 42, &done, now).unwrap();

        assert!(db.load_session(42).unwrap().is_none());
    }
}
