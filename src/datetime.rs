//! The 12-digit `YYYYMMDDHHMM` timestamp field, kept deliberately free of
//! calendar validation: meters are observed to emit out-of-range values
//! (`000000000000`, months/days/hours/minutes past their calendar maximum)
//! and every field must still round-trip.

use std::fmt;

use crate::error::{ContourError, Result};

/// A lenient civil timestamp: each component is bounds-checked against the
/// field widths the meter actually uses, never against calendar validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CivilDateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
}

const MONTH_RANGE: u8 = 20; // 00-19
const DAY_RANGE: u8 = 40; // 00-39
const HOUR_RANGE: u8 = 30; // 00-29
const MINUTE_RANGE: u8 = 70; // 00-69

impl CivilDateTime {
    /// Parse a 12-digit `YYYYMMDDHHMM` field.
    ///
    /// Every character must be an ASCII digit. The tens digit of month, day,
    /// hour, and minute is additionally bounded (1, 3, 2, 6 respectively) so
    /// that e.g. month stays in 00-19 and minute in 00-69; no other
    /// calendar rule applies.
    pub fn parse(s: &str) -> Result<Self> {
        let digits = s.as_bytes();
        if digits.len() != 12 || !digits.iter().all(u8::is_ascii_digit) {
            return Err(ContourError::MalformedRecord(format!(
                "timestamp {s:?} is not 12 ASCII digits"
            )));
        }
        let d = |i: usize| digits[i] - b'0';

        let year = (d(0) as u16) * 1000 + (d(1) as u16) * 100 + (d(2) as u16) * 10 + d(3) as u16;
        let month_tens = d(4);
        let day_tens = d(6);
        let hour_tens = d(8);
        let minute_tens = d(10);

        if month_tens > 1 {
            return Err(ContourError::MalformedRecord(format!(
                "timestamp {s:?} has out-of-range month tens digit"
            )));
        }
        if day_tens > 3 {
            return Err(ContourError::MalformedRecord(format!(
                "timestamp {s:?} has out-of-range day tens digit"
            )));
        }
        if hour_tens > 2 {
            return Err(ContourError::MalformedRecord(format!(
                "timestamp {s:?} has out-of-range hour tens digit"
            )));
        }
        if minute_tens > 6 {
            return Err(ContourError::MalformedRecord(format!(
                "timestamp {s:?} has out-of-range minute tens digit"
            )));
        }

        Ok(CivilDateTime {
            year,
            month: month_tens * 10 + d(5),
            day: day_tens * 10 + d(7),
            hour: hour_tens * 10 + d(9),
            minute: minute_tens * 10 + d(11),
        })
    }

    /// The wire form: `YYYYMMDDHHMM`.
    pub fn to_bayer_field(&self) -> String {
        format!(
            "{:04}{:02}{:02}{:02}{:02}",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }

    /// A readable CSV-column form: `YYYY-MM-DD HH:MM`.
    pub fn to_csv_field(&self) -> String {
        format!(
            "{:04}-{:02}-{:02} {:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }

    /// Pack the components into a single mixed-radix ordinal so that adding
    /// whole minutes and unpacking again reproduces ordinary carry behavior
    /// (minute 69 + 1 rolls into hour, hour 29 + 1 rolls into day, etc.)
    /// without ever consulting a calendar.
    fn to_ordinal_minutes(self) -> i64 {
        let mut n = self.year as i64;
        n = n * MONTH_RANGE as i64 + self.month as i64;
        n = n * DAY_RANGE as i64 + self.day as i64;
        n = n * HOUR_RANGE as i64 + self.hour as i64;
        n = n * MINUTE_RANGE as i64 + self.minute as i64;
        n
    }

    fn from_ordinal_minutes(mut n: i64) -> Self {
        let minute = n.rem_euclid(MINUTE_RANGE as i64);
        n = n.div_euclid(MINUTE_RANGE as i64);
        let hour = n.rem_euclid(HOUR_RANGE as i64);
        n = n.div_euclid(HOUR_RANGE as i64);
        let day = n.rem_euclid(DAY_RANGE as i64);
        n = n.div_euclid(DAY_RANGE as i64);
        let month = n.rem_euclid(MONTH_RANGE as i64);
        n = n.div_euclid(MONTH_RANGE as i64);
        let year = n;

        CivilDateTime {
            year: year.max(0) as u16,
            month: month as u8,
            day: day as u8,
            hour: hour as u8,
            minute: minute as u8,
        }
    }

    /// Apply a signed minute offset, carrying through hour/day/month/year
    /// the same way the ordinal packing does.
    pub fn shift_minutes(self, delta: i64) -> Self {
        Self::from_ordinal_minutes(self.to_ordinal_minutes() + delta)
    }
}

impl fmt::Display for CivilDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_csv_field())
    }
}
