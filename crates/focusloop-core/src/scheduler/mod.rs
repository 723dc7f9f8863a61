//! Reminder planning for the morning and evening passes.
//!
//! Planners read storage and decide who is due right now, in each user's
//! own timezone. Delivery stays with the caller: a nudge only gets its
//! marker stamped after the message goes out, so a failed send is picked
//! up again on the next tick. Suppressed slots (day already recorded, or
//! nothing to remind about) are marked straight away.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;

use crate::error::Result;
use crate::model::{ChatId, CheckinStatus, ReminderMark, User, UserId};
use crate::storage::Database;
use crate::timezone;

/// Morning reminder for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorningNudge {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub name: String,
    pub focus_title: String,
    /// User-local date the reminder is for
    pub date: NaiveDate,
}

impl MorningNudge {
    pub fn mark(&self) -> ReminderMark {
        ReminderMark {
            user_id: self.user_id,
            date: self.date,
        }
    }
}

/// Result of one morning planning pass.
#[derive(Debug, Clone, Default)]
pub struct MorningPass {
    /// Reminders to deliver
    pub nudges: Vec<MorningNudge>,

    /// Slots that came due but need no message; marked without sending
    pub silent: Vec<ReminderMark>,
}

impl MorningPass {
    pub fn is_empty(&self) -> bool {
        self.nudges.is_empty() && self.silent.is_empty()
    }
}

/// What the evening message should say.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EveningKind {
    /// Day already recorded; echo the outcome
    Summary(CheckinStatus),

    /// Nothing recorded yet; ask with the check-in buttons
    Prompt,
}

/// Evening reminder for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EveningNudge {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub name: String,
    pub kind: EveningKind,
    /// User-local date the reminder is for
    pub date: NaiveDate,
}

impl EveningNudge {
    pub fn mark(&self) -> ReminderMark {
        ReminderMark {
            user_id: self.user_id,
            date: self.date,
        }
    }
}

/// Result of one evening planning pass.
#[derive(Debug, Clone, Default)]
pub struct EveningPass {
    pub nudges: Vec<EveningNudge>,
}

enum MorningStep {
    NotDue,
    Silent(ReminderMark),
    Nudge(MorningNudge),
}

/// Plan the morning pass at `now`.
///
/// A user is due once their local clock reaches the morning slot and the
/// slot has not been handled on their local date yet. Users who already
/// recorded the day, or have no focus to be reminded of, come back in the
/// silent list so the slot is not re-evaluated every tick.
pub fn plan_morning(db: &Database, now: DateTime<Utc>) -> Result<MorningPass> {
    let mut pass = MorningPass::default();
    for user in db.users_with_morning_time()? {
        match morning_step(db, &user, now) {
            Ok(MorningStep::Nudge(nudge)) => pass.nudges.push(nudge),
            Ok(MorningStep::Silent(mark)) => pass.silent.push(mark),
            Ok(MorningStep::NotDue) => {}
            Err(e) => warn!(user_id = user.id, err = %e, "morning planning failed for user"),
        }
    }
    Ok(pass)
}

fn morning_step(db: &Database, user: &User, now: DateTime<Utc>) -> Result<MorningStep> {
    let zone = timezone::zone_or_default(&user.timezone);
    let local = timezone::local_now(now, zone);
    let today = local.date();

    if user.last_morning_sent == Some(today) {
        return Ok(MorningStep::NotDue);
    }
    let canonical = match &user.morning_utc {
        Some(canonical) => canonical,
        None => return Ok(MorningStep::NotDue),
    };
    let target = timezone::canonical_to_local(canonical, zone, now)?;
    if local.time() < target {
        return Ok(MorningStep::NotDue);
    }

    let mark = ReminderMark {
        user_id: user.id,
        date: today,
    };
    if db.status_on(user.id, today)?.is_some() {
        return Ok(MorningStep::Silent(mark));
    }
    let focus = match db.active_focus(user.chat_id)? {
        Some(focus) => focus,
        None => return Ok(MorningStep::Silent(mark)),
    };

    Ok(MorningStep::Nudge(MorningNudge {
        user_id: user.id,
        chat_id: user.chat_id,
        name: user.name.clone(),
        focus_title: focus.title,
        date: today,
    }))
}

/// Plan the evening pass at `now`.
///
/// Every due user gets a message: a summary of the recorded outcome, or
/// the check-in prompt when the day is still open.
pub fn plan_evening(db: &Database, now: DateTime<Utc>) -> Result<EveningPass> {
    let mut pass = EveningPass::default();
    for user in db.users_with_evening_time()? {
        match evening_step(db, &user, now) {
            Ok(Some(nudge)) => pass.nudges.push(nudge),
            Ok(None) => {}
            Err(e) => warn!(user_id = user.id, err = %e, "evening planning failed for user"),
        }
    }
    Ok(pass)
}

fn evening_step(db: &Database, user: &User, now: DateTime<Utc>) -> Result<Option<EveningNudge>> {
    let zone = timezone::zone_or_default(&user.timezone);
    let local = timezone::local_now(now, zone);
    let today = local.date();

    if user.last_evening_sent == Some(today) {
        return Ok(None);
    }
    let canonical = match &user.evening_utc {
        Some(canonical) => canonical,
        None => return Ok(None),
    };
    let target = timezone::canonical_to_local(canonical, zone, now)?;
    if local.time() < target {
        return Ok(None);
    }

    let kind = match db.status_on(user.id, today)? {
        Some(status) => EveningKind::Summary(status),
        None => EveningKind::Prompt,
    };

    Ok(Some(EveningNudge {
        user_id: user.id,
        chat_id: user.chat_id,
        name: user.name.clone(),
        kind,
        date: today,
    }))
}
