//! Reply keyboards and their button labels.
//!
//! The labels double as router bindings, so they live here as constants
//! rather than inline strings.

use focusloop_core::timezone::ZONES;

use crate::telegram::ReplyKeyboard;

pub const BTN_DONE: &str = "Done ✅";
pub const BTN_PARTIAL: &str = "Partially 🌓";
pub const BTN_FAILED: &str = "Missed ❌";
pub const BTN_CHECKIN: &str = "Check-in 📋";

/// Three outcome buttons, offered at check-in time.
pub fn checkin() -> ReplyKeyboard {
    ReplyKeyboard::one_time(&[&[BTN_DONE], &[BTN_PARTIAL], &[BTN_FAILED]])
}

/// The always-available check-in entry point, pinned under the input.
pub fn manual_checkin() -> ReplyKeyboard {
    ReplyKeyboard::persistent(&[&[BTN_CHECKIN]])
}

/// Life-area picker shown during onboarding.
pub fn domains() -> ReplyKeyboard {
    ReplyKeyboard::one_time(&[
        &["Work 💼", "Health 🧘"],
        &["Home 🏠", "Learning 📚"],
        &["Other ✨"],
    ])
}

/// Timezone picker, two zones per row.
pub fn timezones() -> ReplyKeyboard {
    let labels: Vec<&str> = ZONES.iter().map(|zone| zone.label).collect();
    let rows: Vec<&[&str]> = labels.chunks(2).collect();
    ReplyKeyboard::one_time(&rows)
}
