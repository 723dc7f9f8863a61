//! Fixed-offset timezone handling for reminder times.
//!
//! Users pick one of a small set of Russian timezones during onboarding.
//! Reminder times are stored in canonical UTC "HH:MM" form; conversion in
//! either direction is anchored to the current date so the clock math has
//! a concrete day to live on.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::{CoreError, Result};

/// One selectable timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneDef {
    /// Stored zone identifier, e.g. "Europe/Moscow"
    pub name: &'static str,

    /// Button label shown during onboarding
    pub label: &'static str,

    /// Whole-hour offset from UTC
    pub offset_hours: i32,
}

impl ZoneDef {
    /// Fixed offset for clock conversion.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.offset_hours * 3600)
            .unwrap_or(FixedOffset::east_opt(0).unwrap())
    }
}

/// The zones offered on the onboarding keyboard.
pub const ZONES: [ZoneDef; 8] = [
    ZoneDef {
        name: "Europe/Kaliningrad",
        label: "Kaliningrad (UTC+2)",
        offset_hours: 2,
    },
    ZoneDef {
        name: "Europe/Moscow",
        label: "Moscow (UTC+3)",
        offset_hours: 3,
    },
    ZoneDef {
        name: "Europe/Samara",
        label: "Samara (UTC+4)",
        offset_hours: 4,
    },
    ZoneDef {
        name: "Asia/Yekaterinburg",
        label: "Yekaterinburg (UTC+5)",
        offset_hours: 5,
    },
    ZoneDef {
        name: "Asia/Krasnoyarsk",
        label: "Krasnoyarsk (UTC+7)",
        offset_hours: 7,
    },
    ZoneDef {
        name: "Asia/Irkutsk",
        label: "Irkutsk (UTC+8)",
        offset_hours: 8,
    },
    ZoneDef {
        name: "Asia/Vladivostok",
        label: "Vladivostok (UTC+10)",
        offset_hours: 10,
    },
    ZoneDef {
        name: "Asia/Magadan",
        label: "Magadan (UTC+11)",
        offset_hours: 11,
    },
];

/// Zone used when a stored name no longer matches the table.
pub const DEFAULT_ZONE: &str = "Europe/Moscow";

/// Look up a zone by stored name or by keyboard label.
pub fn find_zone(input: &str) -> Option<&'static ZoneDef> {
    let wanted = input.trim();
    ZONES
        .iter()
        .find(|z| z.name == wanted || z.label == wanted)
}

/// Resolve a stored zone name, falling back to the default zone.
pub fn zone_or_default(name: &str) -> &'static ZoneDef {
    find_zone(name)
        .or_else(|| find_zone(DEFAULT_ZONE))
        .unwrap_or(&ZONES[1])
}

/// Parse a strict "HH:MM" string.
///
/// Accepts exactly five characters, two digits on each side of a colon;
/// hours must be 0-23 and minutes 0-59. Anything else is an input error
/// the caller turns into a re-prompt.
pub fn parse_hhmm(input: &str) -> Result<NaiveTime> {
    let s = input.trim();
    let b = s.as_bytes();
    if b.len() != 5 || b[2] != b':' {
        return Err(CoreError::InvalidTimeFormat(s.to_string()));
    }
    if !(b[0].is_ascii_digit() && b[1].is_ascii_digit() && b[3].is_ascii_digit() && b[4].is_ascii_digit())
    {
        return Err(CoreError::InvalidTimeFormat(s.to_string()));
    }
    let hours: u32 = s[..2]
        .parse()
        .map_err(|_| CoreError::InvalidTimeFormat(s.to_string()))?;
    let minutes: u32 = s[3..]
        .parse()
        .map_err(|_| CoreError::InvalidTimeFormat(s.to_string()))?;
    NaiveTime::from_hms_opt(hours, minutes, 0)
        .ok_or_else(|| CoreError::InvalidTimeFormat(s.to_string()))
}

/// Format a time back to "HH:MM".
pub fn format_hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Wall-clock datetime in the given zone at the given instant.
pub fn local_now(now: DateTime<Utc>, zone: &ZoneDef) -> NaiveDateTime {
    now.with_timezone(&zone.offset()).naive_local()
}

/// Calendar date in the given zone at the given instant.
pub fn local_today(now: DateTime<Utc>, zone: &ZoneDef) -> NaiveDate {
    local_now(now, zone).date()
}

/// Convert a user-entered local "HH:MM" to its canonical UTC "HH:MM".
///
/// The conversion is anchored to today's date in the user's zone, so a
/// local time that crosses midnight in UTC still lands on the right
/// clock value.
pub fn local_to_canonical(local: &str, zone: &ZoneDef, now: DateTime<Utc>) -> Result<String> {
    let time = parse_hhmm(local)?;
    let anchor = NaiveDateTime::new(local_today(now, zone), time);
    let utc = anchor - zone.offset();
    Ok(format_hhmm(utc.time()))
}

/// Convert a canonical UTC "HH:MM" back to the user's local clock.
pub fn canonical_to_local(canonical: &str, zone: &ZoneDef, now: DateTime<Utc>) -> Result<NaiveTime> {
    let time = parse_hhmm(canonical)?;
    let anchor = NaiveDateTime::new(now.date_naive(), time);
    let local = anchor + zone.offset();
    Ok(local.time())
}
