//! Local-day time helpers.
//!
//! Clinical "today" questions are answered against a 24-hour window that is
//! inclusive at both ends: `00:00:00` through `23:59:59`. Guard semantics
//! depend on these exact boundaries, so every day-window query in the crate
//! goes through [`day_bounds`] rather than building its own range.

use chrono::{Datelike, NaiveDate, NaiveDateTime};

/// Returns the 24-hour window containing `date`, inclusive at both ends.
pub fn day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    // and_hms_opt cannot fail for in-range clock values on a valid date.
    let start = date.and_hms_opt(0, 0, 0).expect("00:00:00 is a valid time");
    let end = date.and_hms_opt(23, 59, 59).expect("23:59:59 is a valid time");
    (start, end)
}

/// Completed years of age at `as_of` for someone born on `birthdate`.
///
/// The birthday itself counts: a patient born 2006-05-15 turns 18 on
/// 2024-05-15, not the day after.
pub fn age_in_years(birthdate: NaiveDate, as_of: NaiveDate) -> i32 {
    let mut age = as_of.year() - birthdate.year();
    if (as_of.month(), as_of.day()) < (birthdate.month(), birthdate.day()) {
        age -= 1;
    }
    age
}
