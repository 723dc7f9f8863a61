//! Command, button, and free-text handlers.
//!
//! Each handler is a sync fn from an incoming event to the replies it
//! produces; delivery stays in the daemon loop. Storage errors turn
//! into a generic apology for the user and a warning in the log.

use chrono::{DateTime, Utc};
use tracing::warn;

use focusloop_core::onboarding::{self, StepOutcome};
use focusloop_core::{
    stats, ChatId, CheckinStatus, CoreError, Database, OnboardingSession, OnboardingState,
};

use crate::keyboards;
use crate::telegram::OutboundMessage;
use crate::texts;

/// Shared state the handlers work against.
pub struct BotContext {
    pub db: Database,
}

/// `/start`. Greets returning users, resumes a half-done conversation,
/// or opens a fresh one.
pub fn start(ctx: &BotContext, chat_id: ChatId, _args: &str, now: DateTime<Utc>) -> Vec<OutboundMessage> {
    match ctx.db.user_by_chat(chat_id) {
        Ok(Some(user)) if user.is_onboarded() => {
            return vec![OutboundMessage::text(chat_id, texts::ALREADY_ONBOARDED)];
        }
        Ok(_) => {}
        Err(e) => return storage_failure(chat_id, &e),
    }
    match ctx.db.load_session(chat_id) {
        Ok(Some(session)) => vec![question(chat_id, session.state)],
        Ok(None) => begin_onboarding(ctx, chat_id, now, texts::ASK_NAME),
        Err(e) => storage_failure(chat_id, &e),
    }
}

/// `/reset`. Restarts onboarding from the name question, whatever the
/// current state. The existing profile stays until the new run finishes.
pub fn reset(ctx: &BotContext, chat_id: ChatId, _args: &str, now: DateTime<Utc>) -> Vec<OutboundMessage> {
    begin_onboarding(ctx, chat_id, now, texts::RESET)
}

pub fn help(_ctx: &BotContext, chat_id: ChatId, _args: &str, _now: DateTime<Utc>) -> Vec<OutboundMessage> {
    vec![OutboundMessage::text(chat_id, texts::HELP)]
}

/// `/focus`. Without arguments shows the active focus; with a new
/// wording replaces it and archives the old one.
pub fn focus(ctx: &BotContext, chat_id: ChatId, args: &str, now: DateTime<Utc>) -> Vec<OutboundMessage> {
    match ctx.db.user_by_chat(chat_id) {
        Ok(Some(user)) if user.is_onboarded() => {}
        Ok(_) => return vec![OutboundMessage::text(chat_id, texts::NOT_ONBOARDED)],
        Err(e) => return storage_failure(chat_id, &e),
    }

    let title = args.trim();
    if title.is_empty() {
        return match ctx.db.active_focus(chat_id) {
            Ok(Some(focus)) => vec![OutboundMessage::text(chat_id, texts::focus_current(&focus.title))],
            Ok(None) => vec![OutboundMessage::text(chat_id, texts::FOCUS_NONE)],
            Err(e) => storage_failure(chat_id, &e),
        };
    }

    match ctx.db.set_focus(chat_id, title, "", now) {
        Ok(_) => vec![OutboundMessage::text(chat_id, texts::focus_updated(title))],
        Err(e) => {
            warn!(chat_id, err = %e, "focus replacement failed");
            vec![OutboundMessage::text(chat_id, texts::FOCUS_UPDATE_FAILED)]
        }
    }
}

pub fn week(ctx: &BotContext, chat_id: ChatId, _args: &str, now: DateTime<Utc>) -> Vec<OutboundMessage> {
    match stats::week_report(&ctx.db, chat_id, now) {
        Ok(report) => {
            let mut replies = vec![OutboundMessage::text(chat_id, texts::week_report(&report))];
            if report.perfect_week {
                replies.push(OutboundMessage::text(chat_id, texts::PERFECT_WEEK));
            }
            replies
        }
        Err(CoreError::UserNotOnboarded | CoreError::NoActiveFocus) => {
            vec![OutboundMessage::text(chat_id, texts::WEEK_NO_FOCUS)]
        }
        Err(CoreError::NoDataForPeriod) => {
            vec![OutboundMessage::text(chat_id, texts::WEEK_NO_CHECKINS)]
        }
        Err(e) => storage_failure(chat_id, &e),
    }
}

pub fn streak(ctx: &BotContext, chat_id: ChatId, _args: &str, _now: DateTime<Utc>) -> Vec<OutboundMessage> {
    match stats::streak_report(&ctx.db, chat_id) {
        Ok(report) => vec![OutboundMessage::text(chat_id, texts::streak_report(&report))],
        Err(CoreError::UserNotOnboarded | CoreError::NoActiveFocus) => {
            vec![OutboundMessage::text(chat_id, texts::NOT_ONBOARDED)]
        }
        Err(e) => storage_failure(chat_id, &e),
    }
}

pub fn done_command(ctx: &BotContext, chat_id: ChatId, _args: &str, now: DateTime<Utc>) -> Vec<OutboundMessage> {
    record_simple(ctx, chat_id, CheckinStatus::Done, now)
}

pub fn partial_command(ctx: &BotContext, chat_id: ChatId, _args: &str, now: DateTime<Utc>) -> Vec<OutboundMessage> {
    record_simple(ctx, chat_id, CheckinStatus::Partial, now)
}

pub fn fail_command(ctx: &BotContext, chat_id: ChatId, _args: &str, now: DateTime<Utc>) -> Vec<OutboundMessage> {
    record_simple(ctx, chat_id, CheckinStatus::Failed, now)
}

pub fn done_button(ctx: &BotContext, chat_id: ChatId, _args: &str, now: DateTime<Utc>) -> Vec<OutboundMessage> {
    record_detailed(ctx, chat_id, CheckinStatus::Done, now)
}

pub fn partial_button(ctx: &BotContext, chat_id: ChatId, _args: &str, now: DateTime<Utc>) -> Vec<OutboundMessage> {
    record_detailed(ctx, chat_id, CheckinStatus::Partial, now)
}

pub fn failed_button(ctx: &BotContext, chat_id: ChatId, _args: &str, now: DateTime<Utc>) -> Vec<OutboundMessage> {
    record_detailed(ctx, chat_id, CheckinStatus::Failed, now)
}

/// The pinned "Check-in 📋" button: asks about today and offers the
/// three outcomes.
pub fn checkin_button(_ctx: &BotContext, chat_id: ChatId, _args: &str, _now: DateTime<Utc>) -> Vec<OutboundMessage> {
    vec![OutboundMessage::with_keyboard(
        chat_id,
        texts::CHECKIN_QUESTION,
        keyboards::checkin(),
    )]
}

/// Anything that is not a command or a known button. Feeds an open
/// onboarding conversation; otherwise points at /help.
pub fn free_text(ctx: &BotContext, chat_id: ChatId, text: &str, now: DateTime<Utc>) -> Vec<OutboundMessage> {
    match ctx.db.load_session(chat_id) {
        Ok(Some(mut session)) => onboarding_reply(ctx, chat_id, &mut session, text, now),
        Ok(None) => vec![OutboundMessage::text(chat_id, texts::FALLBACK)],
        Err(e) => storage_failure(chat_id, &e),
    }
}

fn begin_onboarding(
    ctx: &BotContext,
    chat_id: ChatId,
    now: DateTime<Utc>,
    greeting: &str,
) -> Vec<OutboundMessage> {
    let session = OnboardingSession::new();
    let saved = ctx
        .db
        .create_user(chat_id, now)
        .and_then(|_| ctx.db.save_session(chat_id, &session));
    if let Err(e) = saved {
        return storage_failure(chat_id, &e);
    }
    vec![OutboundMessage::text(chat_id, greeting)]
}

fn onboarding_reply(
    ctx: &BotContext,
    chat_id: ChatId,
    session: &mut OnboardingSession,
    text: &str,
    now: DateTime<Utc>,
) -> Vec<OutboundMessage> {
    match onboarding::advance(session, text) {
        Ok(StepOutcome::Continue(state)) => {
            if let Err(e) = ctx.db.save_session(chat_id, session) {
                return storage_failure(chat_id, &e);
            }
            vec![question(chat_id, state)]
        }
        Ok(StepOutcome::Complete(done)) => {
            match onboarding::complete_onboarding(&ctx.db, chat_id, &done, now) {
                Ok(()) => vec![
                    OutboundMessage::text(
                        chat_id,
                        texts::onboarding_complete(&done.focus_title, &done.domain),
                    ),
                    OutboundMessage::with_keyboard(
                        chat_id,
                        texts::CHECKIN_HOWTO,
                        keyboards::manual_checkin(),
                    ),
                ],
                Err(e) => storage_failure(chat_id, &e),
            }
        }
        Err(CoreError::InvalidTimeFormat(_)) => {
            vec![OutboundMessage::text(chat_id, texts::BAD_TIME)]
        }
        Err(CoreError::InvalidTimezoneChoice(_)) => vec![OutboundMessage::with_keyboard(
            chat_id,
            texts::BAD_TIMEZONE,
            keyboards::timezones(),
        )],
        Err(e) => storage_failure(chat_id, &e),
    }
}

/// The question matching an onboarding state, with its keyboard where
/// one applies.
fn question(chat_id: ChatId, state: OnboardingState) -> OutboundMessage {
    match state {
        OnboardingState::AwaitingName => OutboundMessage::text(chat_id, texts::ASK_NAME),
        OnboardingState::AwaitingMorningTime => {
            OutboundMessage::text(chat_id, texts::ASK_MORNING_TIME)
        }
        OnboardingState::AwaitingEveningTime => {
            OutboundMessage::text(chat_id, texts::ASK_EVENING_TIME)
        }
        OnboardingState::AwaitingTimezone => {
            OutboundMessage::with_keyboard(chat_id, texts::ASK_TIMEZONE, keyboards::timezones())
        }
        OnboardingState::AwaitingDomain => {
            OutboundMessage::with_keyboard(chat_id, texts::ASK_DOMAIN, keyboards::domains())
        }
        OnboardingState::AwaitingFocus => OutboundMessage::text(chat_id, texts::ASK_FOCUS),
    }
}

fn record_detailed(
    ctx: &BotContext,
    chat_id: ChatId,
    status: CheckinStatus,
    now: DateTime<Utc>,
) -> Vec<OutboundMessage> {
    match ctx.db.record_checkin(chat_id, status, now) {
        Ok(recorded) => vec![OutboundMessage::text(
            chat_id,
            texts::checkin_reply(status, &recorded),
        )],
        Err(CoreError::UserNotOnboarded | CoreError::NoActiveFocus) => {
            vec![OutboundMessage::text(chat_id, texts::NOT_ONBOARDED)]
        }
        Err(e) => storage_failure(chat_id, &e),
    }
}

fn record_simple(
    ctx: &BotContext,
    chat_id: ChatId,
    status: CheckinStatus,
    now: DateTime<Utc>,
) -> Vec<OutboundMessage> {
    match ctx.db.record_checkin(chat_id, status, now) {
        Ok(_) => vec![OutboundMessage::text(chat_id, texts::quick_confirmation(status))],
        Err(CoreError::UserNotOnboarded | CoreError::NoActiveFocus) => {
            vec![OutboundMessage::text(chat_id, texts::NOT_ONBOARDED)]
        }
        Err(e) => storage_failure(chat_id, &e),
    }
}

fn storage_failure(chat_id: ChatId, err: &CoreError) -> Vec<OutboundMessage> {
    warn!(chat_id, err = %err, "storage operation failed");
    vec![OutboundMessage::text(chat_id, texts::SOMETHING_WENT_WRONG)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use focusloop_core::storage::ProfileRecord;

    fn ctx() -> BotContext {
        BotContext {
            db: Database::open_memory().unwrap(),
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    /// Walk the whole onboarding conversation for chat 42.
    fn onboard(ctx: &BotContext) {
        start(ctx, 42, "", at(10, 9));
        let answers = [
            "Lena",
            "08:30",
            "21:30",
            "Moscow (UTC+3)",
            "Health 🧘",
            "stretch every morning",
        ];
        for answer in answers {
            free_text(ctx, 42, answer, at(10, 9));
        }
    }

    #[test]
    fn start_asks_for_name_and_opens_a_session() {
        let ctx = ctx();
        let replies = start(&ctx, 42, "", at(10, 9));
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].text, texts::ASK_NAME);
        assert!(ctx.db.load_session(42).unwrap().is_some());
    }

    #[test]
    fn onboarding_walk_sets_profile_and_focus() {
        let ctx = ctx();
        onboard(&ctx);

        let user = ctx.db.user_by_chat(42).unwrap().unwrap();
        assert!(user.is_onboarded());
        assert_eq!(user.name, "Lena");

        let focus = ctx.db.active_focus(42).unwrap().unwrap();
        assert_eq!(focus.title, "stretch every morning");
        assert_eq!(focus.domain, "Health 🧘");

        assert!(ctx.db.load_session(42).unwrap().is_none());
    }

    #[test]
    fn final_answer_confirms_and_offers_checkin() {
        let ctx = ctx();
        start(&ctx, 42, "", at(10, 9));
        for answer in ["Lena", "08:30", "21:30", "Moscow (UTC+3)", "Health 🧘"] {
            free_text(&ctx, 42, answer, at(10, 9));
        }

        let replies = free_text(&ctx, 42, "stretch every morning", at(10, 9));
        assert_eq!(replies.len(), 2);
        assert!(replies[0].text.contains("stretch every morning"));
        assert!(replies[0].text.contains("Health 🧘"));
        assert!(replies[1].keyboard.is_some());
    }

    #[test]
    fn bad_time_keeps_the_question_open() {
        let ctx = ctx();
        start(&ctx, 42, "", at(10, 9));
        free_text(&ctx, 42, "Lena", at(10, 9));

        let replies = free_text(&ctx, 42, "8 in the morning", at(10, 9));
        assert_eq!(replies[0].text, texts::BAD_TIME);
        let session = ctx.db.load_session(42).unwrap().unwrap();
        assert_eq!(session.state, OnboardingState::AwaitingMorningTime);

        let replies = free_text(&ctx, 42, "08:30", at(10, 9));
        assert_eq!(replies[0].text, texts::ASK_EVENING_TIME);
    }

    #[test]
    fn timezone_question_comes_with_the_picker() {
        let ctx = ctx();
        start(&ctx, 42, "", at(10, 9));
        for answer in ["Lena", "08:30"] {
            free_text(&ctx, 42, answer, at(10, 9));
        }

        let replies = free_text(&ctx, 42, "21:30", at(10, 9));
        let kb = replies[0].keyboard.as_ref().unwrap();
        let buttons: usize = kb.keyboard.iter().map(|row| row.len()).sum();
        assert_eq!(buttons, 8);
    }

    #[test]
    fn wrong_zone_reprompts_with_buttons() {
        let ctx = ctx();
        start(&ctx, 42, "", at(10, 9));
        for answer in ["Lena", "08:30", "21:30"] {
            free_text(&ctx, 42, answer, at(10, 9));
        }

        let replies = free_text(&ctx, 42, "Mars", at(10, 9));
        assert_eq!(replies[0].text, texts::BAD_TIMEZONE);
        assert!(replies[0].keyboard.is_some());
        let session = ctx.db.load_session(42).unwrap().unwrap();
        assert_eq!(session.state, OnboardingState::AwaitingTimezone);
    }

    #[test]
    fn start_after_setup_greets_shortly() {
        let ctx = ctx();
        onboard(&ctx);

        let replies = start(&ctx, 42, "", at(11, 9));
        assert_eq!(replies[0].text, texts::ALREADY_ONBOARDED);
        assert!(ctx.db.load_session(42).unwrap().is_none());
    }

    #[test]
    fn start_mid_session_resumes_the_question() {
        let ctx = ctx();
        start(&ctx, 42, "", at(10, 9));
        free_text(&ctx, 42, "Lena", at(10, 9));

        let replies = start(&ctx, 42, "", at(10, 9));
        assert_eq!(replies[0].text, texts::ASK_MORNING_TIME);
        // The answer already given is still there
        let session = ctx.db.load_session(42).unwrap().unwrap();
        assert_eq!(session.name.as_deref(), Some("Lena"));
    }

    #[test]
    fn reset_restarts_even_when_set_up() {
        let ctx = ctx();
        onboard(&ctx);

        let replies = reset(&ctx, 42, "", at(11, 9));
        assert_eq!(replies[0].text, texts::RESET);
        let session = ctx.db.load_session(42).unwrap().unwrap();
        assert_eq!(session.state, OnboardingState::AwaitingName);
        // Profile survives until the new run completes
        assert!(ctx.db.user_by_chat(42).unwrap().unwrap().is_onboarded());
    }

    #[test]
    fn buttons_gate_on_setup() {
        let ctx = ctx();
        let replies = done_button(&ctx, 42, "", at(10, 12));
        assert_eq!(replies[0].text, texts::NOT_ONBOARDED);
    }

    #[test]
    fn first_button_press_then_change_of_mind() {
        let ctx = ctx();
        onboard(&ctx);

        let replies = done_button(&ctx, 42, "", at(11, 12));
        assert!(replies[0].text.contains("the day is counted"));

        let replies = partial_button(&ctx, 42, "", at(11, 13));
        assert!(replies[0].text.contains("status is now: partially done 🌓"));
        assert!(replies[0].text.contains("evening summary"));
    }

    #[test]
    fn change_after_evening_points_at_stats() {
        let ctx = ctx();
        onboard(&ctx);
        done_button(&ctx, 42, "", at(10, 12));

        let profile = ProfileRecord {
            name: "Lena".to_string(),
            timezone: "Europe/Moscow".to_string(),
            morning_utc: "05:30".to_string(),
            evening_utc: "18:30".to_string(),
            started_on: day(10),
            last_morning_sent: Some(day(10)),
            last_evening_sent: Some(day(10)),
        };
        ctx.db.update_profile(42, &profile).unwrap();

        let replies = failed_button(&ctx, 42, "", at(10, 19));
        assert!(replies[0].text.contains("status is now: not done ❌"));
        assert!(replies[0].text.contains("stats have been updated"));
    }

    #[test]
    fn slash_commands_reply_short() {
        let ctx = ctx();
        onboard(&ctx);

        let replies = done_command(&ctx, 42, "", at(11, 12));
        assert_eq!(replies[0].text, texts::quick_confirmation(CheckinStatus::Done));

        // Even when it changes the day, the command keeps the short form
        let replies = fail_command(&ctx, 42, "", at(11, 13));
        assert_eq!(replies[0].text, texts::quick_confirmation(CheckinStatus::Failed));
        assert!(!replies[0].text.contains("status is now"));
    }

    #[test]
    fn focus_inspects_and_replaces() {
        let ctx = ctx();
        onboard(&ctx);

        let replies = focus(&ctx, 42, "", at(11, 9));
        assert!(replies[0].text.contains("stretch every morning"));

        let replies = focus(&ctx, 42, "read 10 pages", at(12, 9));
        assert!(replies[0].text.contains("read 10 pages"));
        let active = ctx.db.active_focus(42).unwrap().unwrap();
        assert_eq!(active.title, "read 10 pages");
    }

    #[test]
    fn focus_requires_setup() {
        let ctx = ctx();
        let replies = focus(&ctx, 42, "anything", at(10, 9));
        assert_eq!(replies[0].text, texts::NOT_ONBOARDED);
    }

    #[test]
    fn week_empty_states() {
        let ctx = ctx();
        let replies = week(&ctx, 42, "", at(10, 12));
        assert_eq!(replies[0].text, texts::WEEK_NO_FOCUS);

        onboard(&ctx);
        let replies = week(&ctx, 42, "", at(10, 12));
        assert_eq!(replies[0].text, texts::WEEK_NO_CHECKINS);
    }

    #[test]
    fn perfect_week_earns_a_second_message() {
        let ctx = ctx();
        onboard(&ctx);
        for d in 11..=17 {
            done_command(&ctx, 42, "", at(d, 12));
        }

        let replies = week(&ctx, 42, "", at(17, 13));
        assert_eq!(replies.len(), 2);
        assert!(replies[0].text.contains("100%"));
        assert_eq!(replies[1].text, texts::PERFECT_WEEK);
    }

    #[test]
    fn streak_view_renders_badge() {
        let ctx = ctx();
        onboard(&ctx);
        for d in 11..=13 {
            done_command(&ctx, 42, "", at(d, 12));
        }

        let replies = streak(&ctx, 42, "", at(13, 13));
        assert!(replies[0].text.contains("Current: 3 days in a row 🙂"));
    }

    #[test]
    fn streak_requires_setup() {
        let ctx = ctx();
        let replies = streak(&ctx, 42, "", at(10, 9));
        assert_eq!(replies[0].text, texts::NOT_ONBOARDED);
    }

    #[test]
    fn stray_text_gets_the_hint() {
        let ctx = ctx();
        onboard(&ctx);
        let replies = free_text(&ctx, 42, "what do I do", at(11, 9));
        assert_eq!(replies[0].text, texts::FALLBACK);
    }
}
