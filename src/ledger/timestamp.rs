//! Ledger timestamp formatting.
//!
//! The log table's consumers parse this exact shape, so it must stay
//! bit-compatible: `YYYY-MM-DD, h:mm:ss AM/PM`, 12-hour wall-clock hour with
//! 0 normalized to 12, zero-padded month/day/minute/second, server-local
//! time.

use chrono::{Datelike, Local, NaiveDateTime, Timelike};

/// Current server-local time in ledger format.
pub fn now_string() -> String {
    format_ledger_timestamp(Local::now().naive_local())
}

pub fn format_ledger_timestamp(dt: NaiveDateTime) -> String {
    let (hour24, minute, second) = (dt.hour(), dt.minute(), dt.second());
    let meridiem = if hour24 < 12 { "AM" } else { "PM" };
    let hour12 = match hour24 % 12 {
        0 => 12,
        h => h,
    };
    format!(
        "{:04}-{:02}-{:02}, {}:{:02}:{:02} {}",
        dt.year(),
        dt.month(),
        dt.day(),
        hour12,
        minute,
        second,
        meridiem
    )
}
