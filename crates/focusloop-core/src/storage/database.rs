//! SQLite-based storage for users, focuses, and daily check-ins.
//!
//! Provides persistent storage for:
//! - User profiles and reminder settings
//! - Focus habits (one active per user)
//! - Daily check-ins keyed by user-local date
//! - In-flight onboarding sessions

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{data_dir, migrations};
use crate::error::{CoreError, DatabaseError, Result};
use crate::model::{CheckinStatus, ChatId, Focus, FocusId, ReminderMark, User, UserId};
use crate::onboarding::OnboardingSession;
use crate::timezone;

// === Helper Functions ===

/// Parse check-in status from database string
fn parse_status(status_str: &str) -> CheckinStatus {
    CheckinStatus::parse(status_str).unwrap_or(CheckinStatus::Failed)
}

/// Format a calendar date for database storage
fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a calendar date column, tolerating NULL
fn parse_date_opt(date_str: Option<String>) -> Option<NaiveDate> {
    date_str.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

/// Parse datetime from RFC3339 string with fallback to current time
fn parse_datetime_fallback(dt_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Build a User from a database row
fn row_to_user(row: &rusqlite::Row) -> Result<User, rusqlite::Error> {
    let name: Option<String> = row.get(2)?;
    let started_on: Option<String> = row.get(6)?;
    let last_morning_sent: Option<String> = row.get(7)?;
    let last_evening_sent: Option<String> = row.get(8)?;
    let created_at: String = row.get(9)?;

    Ok(User {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        name: name.unwrap_or_default(),
        timezone: row.get(3)?,
        morning_utc: row.get(4)?,
        evening_utc: row.get(5)?,
        started_on: parse_date_opt(started_on),
        last_morning_sent: parse_date_opt(last_morning_sent),
        last_evening_sent: parse_date_opt(last_evening_sent),
        created_at: parse_datetime_fallback(&created_at),
    })
}

/// Build a Focus from a database row
fn row_to_focus(row: &rusqlite::Row) -> Result<Focus, rusqlite::Error> {
    let started_at: String = row.get(6)?;
    let ended_at: Option<String> = row.get(7)?;

    Ok(Focus {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        domain: row.get(3)?,
        is_active: row.get::<_, i64>(4)? != 0,
        best_streak: row.get(5)?,
        started_at: parse_datetime_fallback(&started_at),
        ended_at: ended_at.map(|s| parse_datetime_fallback(&s)),
    })
}

const USER_COLUMNS: &str =
    "id, chat_id, name, timezone, morning_utc, evening_utc, started_on, \
     last_morning_sent, last_evening_sent, created_at";

/// Everything written when an onboarding run completes.
#[derive(Debug, Clone)]
pub struct ProfileRecord {
    pub name: String,
    pub timezone: String,
    pub morning_utc: String,
    pub evening_utc: String,
    pub started_on: NaiveDate,
    /// Set when the morning slot already passed today, so the first
    /// reminder waits for tomorrow.
    pub last_morning_sent: Option<NaiveDate>,
    /// Same for the evening slot.
    pub last_evening_sent: Option<NaiveDate>,
}

/// Result of recording a day, for reply phrasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckinRecorded {
    /// User-local date the record landed on
    pub date: NaiveDate,

    /// Status that was on file for the day before this write
    pub previous: Option<CheckinStatus>,

    /// Whether this day's evening message already went out
    pub evening_already_sent: bool,
}

/// SQLite database for focusloop state.
///
/// Stores users, focuses, check-ins, and onboarding sessions.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/focusloop/focusloop.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("focusloop.db");
        Self::open_at(&path)
    }

    /// Open the database at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::from)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        // Create base tables (v1 schema) first
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id                INTEGER PRIMARY KEY AUTOINCREMENT,
                    chat_id           INTEGER NOT NULL UNIQUE,
                    name              TEXT,
                    morning_utc       TEXT,
                    evening_utc       TEXT,
                    started_on        TEXT,
                    last_morning_sent TEXT,
                    last_evening_sent TEXT,
                    created_at        TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS focuses (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id     INTEGER NOT NULL REFERENCES users(id),
                    title       TEXT NOT NULL,
                    domain      TEXT NOT NULL DEFAULT '',
                    is_active   INTEGER NOT NULL DEFAULT 1,
                    best_streak INTEGER NOT NULL DEFAULT 0,
                    started_at  TEXT NOT NULL,
                    ended_at    TEXT
                );

                CREATE TABLE IF NOT EXISTS checkins (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id     INTEGER NOT NULL REFERENCES users(id),
                    focus_id    INTEGER NOT NULL REFERENCES focuses(id),
                    date        TEXT NOT NULL,
                    status      TEXT NOT NULL,
                    recorded_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS onboarding_sessions (
                    user_id INTEGER PRIMARY KEY REFERENCES users(id),
                    data    TEXT NOT NULL
                );

                -- One active focus per user, one check-in per focus-day
                CREATE UNIQUE INDEX IF NOT EXISTS idx_focuses_one_active
                    ON focuses(user_id) WHERE is_active = 1;
                CREATE UNIQUE INDEX IF NOT EXISTS idx_checkins_day
                    ON checkins(user_id, focus_id, date);
                CREATE INDEX IF NOT EXISTS idx_checkins_focus_date
                    ON checkins(focus_id, date);",
            )
            .map_err(DatabaseError::from)?;

        // Run incremental migrations (v1 -> v2, etc.)
        migrations::migrate(&self.conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

        Ok(())
    }

    // === Users ===

    /// Register a chat, returning the user row id.
    ///
    /// Safe to call repeatedly; an existing row is left untouched.
    pub fn create_user(&self, chat_id: ChatId, now: DateTime<Utc>) -> Result<UserId> {
        self.conn.execute(
            "INSERT OR IGNORE INTO users (chat_id, created_at) VALUES (?1, ?2)",
            params![chat_id, now.to_rfc3339()],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM users WHERE chat_id = ?1",
            params![chat_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Look up a user by chat id.
    pub fn user_by_chat(&self, chat_id: ChatId) -> Result<Option<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE chat_id = ?1"
        ))?;
        let user = stmt
            .query_row(params![chat_id], row_to_user)
            .optional()?;
        Ok(user)
    }

    /// Write a completed onboarding profile onto the user row.
    pub fn update_profile(&self, chat_id: ChatId, profile: &ProfileRecord) -> Result<()> {
        self.conn.execute(
            "UPDATE users
             SET name = ?2,
                 timezone = ?3,
                 morning_utc = ?4,
                 evening_utc = ?5,
                 started_on = ?6,
                 last_morning_sent = ?7,
                 last_evening_sent = ?8
             WHERE chat_id = ?1",
            params![
                chat_id,
                profile.name,
                profile.timezone,
                profile.morning_utc,
                profile.evening_utc,
                format_date(profile.started_on),
                profile.last_morning_sent.map(format_date),
                profile.last_evening_sent.map(format_date),
            ],
        )?;
        Ok(())
    }

    // === Focuses ===

    /// Replace the user's active focus with a new one, in one transaction.
    ///
    /// The previous focus (if any) is deactivated and stamped with an end
    /// time; its check-in history stays attached to it.
    ///
    /// # Errors
    /// Returns `UserNotOnboarded` if the chat has no user row.
    pub fn set_focus(
        &self,
        chat_id: ChatId,
        title: &str,
        domain: &str,
        now: DateTime<Utc>,
    ) -> Result<Focus> {
        let user_id: UserId = self
            .conn
            .query_row(
                "SELECT id FROM users WHERE chat_id = ?1",
                params![chat_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(CoreError::UserNotOnboarded)?;

        let tx = self.conn.unchecked_transaction().map_err(DatabaseError::from)?;
        tx.execute(
            "UPDATE focuses
             SET is_active = 0, ended_at = ?1
             WHERE user_id = ?2 AND is_active = 1",
            params![now.to_rfc3339(), user_id],
        )?;
        tx.execute(
            "INSERT INTO focuses (user_id, title, domain, is_active, best_streak, started_at)
             VALUES (?1, ?2, ?3, 1, 0, ?4)",
            params![user_id, title, domain, now.to_rfc3339()],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit().map_err(DatabaseError::from)?;

        Ok(Focus {
            id,
            user_id,
            title: title.to_string(),
            domain: domain.to_string(),
            is_active: true,
            best_streak: 0,
            started_at: now,
            ended_at: None,
        })
    }

    /// The user's current focus, if any.
    pub fn active_focus(&self, chat_id: ChatId) -> Result<Option<Focus>> {
        let mut stmt = self.conn.prepare(
            "SELECT f.id, f.user_id, f.title, f.domain, f.is_active, f.best_streak,
                    f.started_at, f.ended_at
             FROM focuses f
             JOIN users u ON u.id = f.user_id
             WHERE u.chat_id = ?1 AND f.is_active = 1
             ORDER BY f.started_at DESC
             LIMIT 1",
        )?;
        let focus = stmt
            .query_row(params![chat_id], row_to_focus)
            .optional()?;
        Ok(focus)
    }

    /// Raise the stored best streak if the new value beats it.
    pub fn update_best_streak(&self, focus_id: FocusId, streak: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE focuses SET best_streak = ?2 WHERE id = ?1 AND best_streak < ?2",
            params![focus_id, streak],
        )?;
        Ok(())
    }

    // === Check-ins ===

    /// Record today's outcome for the active focus.
    ///
    /// "Today" is the user-local calendar date at `now`. A second record on
    /// the same day replaces the first. When the record lands before the
    /// morning reminder time (or no morning time is set), the morning
    /// reminder for the day is marked as handled in the same transaction.
    ///
    /// # Errors
    /// Returns `UserNotOnboarded` or `NoActiveFocus` when the preconditions
    /// are not met.
    pub fn record_checkin(
        &self,
        chat_id: ChatId,
        status: CheckinStatus,
        now: DateTime<Utc>,
    ) -> Result<CheckinRecorded> {
        let user = self
            .user_by_chat(chat_id)?
            .ok_or(CoreError::UserNotOnboarded)?;
        if !user.is_onboarded() {
            return Err(CoreError::UserNotOnboarded);
        }
        let focus = self
            .active_focus(chat_id)?
            .ok_or(CoreError::NoActiveFocus)?;

        let zone = timezone::zone_or_default(&user.timezone);
        let local = timezone::local_now(now, zone);
        let date = local.date();

        let suppress_morning = match &user.morning_utc {
            None => true,
            Some(canonical) => {
                let morning_local = timezone::canonical_to_local(canonical, zone, now)?;
                local.time() <= morning_local
            }
        };

        let previous = self.status_on(user.id, date)?;
        let evening_already_sent = user.last_evening_sent == Some(date);

        let tx = self.conn.unchecked_transaction().map_err(DatabaseError::from)?;
        tx.execute(
            "INSERT OR REPLACE INTO checkins (user_id, focus_id, date, status, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id,
                focus.id,
                format_date(date),
                status.as_str(),
                now.to_rfc3339(),
            ],
        )?;
        if suppress_morning {
            tx.execute(
                "UPDATE users SET last_morning_sent = ?1 WHERE id = ?2",
                params![format_date(date), user.id],
            )?;
        }
        tx.commit().map_err(DatabaseError::from)?;

        Ok(CheckinRecorded {
            date,
            previous,
            evening_already_sent,
        })
    }

    /// Status on file for a user-local date, regardless of focus.
    pub fn status_on(&self, user_id: UserId, date: NaiveDate) -> Result<Option<CheckinStatus>> {
        let status: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM checkins
                 WHERE user_id = ?1 AND date = ?2
                 ORDER BY id DESC
                 LIMIT 1",
                params![user_id, format_date(date)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(status.as_deref().map(parse_status))
    }

    /// Every recorded day for a focus, oldest first.
    ///
    /// Used for streak walks, which are not bounded to a window.
    pub fn checkin_history(
        &self,
        user_id: UserId,
        focus_id: FocusId,
    ) -> Result<BTreeMap<NaiveDate, CheckinStatus>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, status FROM checkins
             WHERE user_id = ?1 AND focus_id = ?2
             ORDER BY date ASC",
        )?;
        let rows = stmt.query_map(params![user_id, focus_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut history = BTreeMap::new();
        for row in rows {
            let (date_str, status_str) = row.map_err(DatabaseError::from)?;
            if let Ok(date) = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d") {
                history.insert(date, parse_status(&status_str));
            }
        }
        Ok(history)
    }

    /// Recorded days for a focus within an inclusive date range.
    ///
    /// Missing days are simply absent from the map.
    pub fn statuses_in_range(
        &self,
        user_id: UserId,
        focus_id: FocusId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, CheckinStatus>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, status FROM checkins
             WHERE user_id = ?1 AND focus_id = ?2
               AND date BETWEEN ?3 AND ?4
             ORDER BY date ASC",
        )?;
        let rows = stmt.query_map(
            params![user_id, focus_id, format_date(from), format_date(to)],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )?;

        let mut statuses = BTreeMap::new();
        for row in rows {
            let (date_str, status_str) = row.map_err(DatabaseError::from)?;
            if let Ok(date) = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d") {
                statuses.insert(date, parse_status(&status_str));
            }
        }
        Ok(statuses)
    }

    // === Reminder scheduling ===

    /// Users with a morning reminder configured.
    ///
    /// Whether the reminder is due (and whether it already fired today in
    /// the user's zone) is decided by the planner, which knows the user's
    /// local clock.
    pub fn users_with_morning_time(&self) -> Result<Vec<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE morning_utc IS NOT NULL"
        ))?;
        let rows = stmt.query_map([], row_to_user)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row.map_err(DatabaseError::from)?);
        }
        Ok(users)
    }

    /// Users with an evening reminder configured.
    pub fn users_with_evening_time(&self) -> Result<Vec<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE evening_utc IS NOT NULL"
        ))?;
        let rows = stmt.query_map([], row_to_user)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row.map_err(DatabaseError::from)?);
        }
        Ok(users)
    }

    /// Stamp morning markers after a delivery pass.
    ///
    /// Marks are grouped by local date so each distinct date is one UPDATE.
    pub fn mark_morning_sent(&self, marks: &[ReminderMark]) -> Result<()> {
        self.bulk_mark("last_morning_sent", marks)
    }

    /// Stamp evening markers after a delivery pass.
    pub fn mark_evening_sent(&self, marks: &[ReminderMark]) -> Result<()> {
        self.bulk_mark("last_evening_sent", marks)
    }

    fn bulk_mark(&self, column: &str, marks: &[ReminderMark]) -> Result<()> {
        if marks.is_empty() {
            return Ok(());
        }

        let mut by_date: BTreeMap<NaiveDate, Vec<UserId>> = BTreeMap::new();
        for mark in marks {
            by_date.entry(mark.date).or_default().push(mark.user_id);
        }

        for (date, user_ids) in by_date {
            let placeholders = vec!["?"; user_ids.len()].join(",");
            let sql = format!(
                "UPDATE users SET {column} = ? WHERE id IN ({placeholders})"
            );
            let date_str = format_date(date);
            let mut values: Vec<&dyn rusqlite::ToSql> = vec![&date_str];
            for id in &user_ids {
                values.push(id);
            }
            self.conn.execute(&sql, &values[..])?;
        }
        Ok(())
    }

    // === Onboarding sessions ===

    /// Load the in-flight onboarding session for a chat, if any.
    pub fn load_session(&self, chat_id: ChatId) -> Result<Option<OnboardingSession>> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT s.data
                 FROM onboarding_sessions s
                 JOIN users u ON u.id = s.user_id
                 WHERE u.chat_id = ?1",
                params![chat_id],
                |row| row.get(0),
            )
            .optional()?;
        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Persist an onboarding session for a chat.
    ///
    /// No-op when the chat has no user row yet.
    pub fn save_session(&self, chat_id: ChatId, session: &OnboardingSession) -> Result<()> {
        let json = serde_json::to_string(session)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO onboarding_sessions (user_id, data)
             SELECT id, ?2 FROM users WHERE chat_id = ?1",
            params![chat_id, json],
        )?;
        Ok(())
    }

    /// Drop the onboarding session for a chat.
    pub fn clear_session(&self, chat_id: ChatId) -> Result<()> {
        self.conn.execute(
            "DELETE FROM onboarding_sessions
             WHERE user_id IN (SELECT id FROM users WHERE chat_id = ?1)",
            params![chat_id],
        )?;
        Ok(())
    }
}
