//! Command-line surface: flags mirror the original driver's `lowLevelAPI` /
//! `highLevelAPI` split, record-kind selection, and time-shift correction.

use std::path::PathBuf;

use clap::Parser;

use crate::error::{ContourError, Result};
use crate::pipeline::RecordFilter;

#[derive(Parser, Debug)]
#[command(name = "contourpp", about = "Read records off a Bayer/Ascensia Contour-family meter")]
pub struct Args {
    /// Talk to the meter at the session/frame level and print raw ASTM text
    /// instead of parsed records.
    #[arg(short = 'l', long = "lowlevel-api")]
    pub lowlevel_api: bool,

    /// Render output in the wire-like Bayer text form instead of CSV.
    #[arg(short = 'B', long = "bayer-format")]
    pub bayer_format: bool,

    /// Keep only after-meal glucose records.
    #[arg(short = 'a', long = "after-meal-only")]
    pub after_meal_only: bool,

    /// Read ASTM text from a file instead of a live meter. May be given
    /// more than once; files are read in order.
    #[arg(short = 'f', long = "input-file")]
    pub input_file: Vec<PathBuf>,

    /// Shift every record's timestamp by `[-]HH:MM[:SS]`.
    #[arg(short = 't', long = "time-shift")]
    pub time_shift: Option<String>,

    /// Keep glucose records.
    #[arg(short = 'g', long = "glucose")]
    pub glucose: bool,

    /// Keep short-acting insulin records.
    #[arg(short = 'i', long = "insulin-short")]
    pub insulin_short: bool,

    /// Keep long-acting insulin records.
    #[arg(short = 'I', long = "insulin-long")]
    pub insulin_long: bool,

    /// Keep carbohydrate records.
    #[arg(short = 'c', long = "carbs")]
    pub carbs: bool,
}

impl Args {
    /// Build the record filter these flags describe: empty (pass
    /// everything) unless at least one kind-selecting flag was given.
    pub fn record_filter(&self) -> RecordFilter {
        let mut filter = RecordFilter::empty();
        if self.glucose {
            filter |= RecordFilter::GLUCOSE;
        }
        if self.insulin_short {
            filter |= RecordFilter::INSULIN_SHORT;
        }
        if self.insulin_long {
            filter |= RecordFilter::INSULIN_LONG;
        }
        if self.carbs {
            filter |= RecordFilter::CARBS;
        }
        if self.after_meal_only {
            filter |= RecordFilter::AFTER_MEAL_ONLY;
        }
        filter
    }

    /// Parse `time_shift` into a signed minute count, if given.
    pub fn shift_minutes(&self) -> Result<i64> {
        match &self.time_shift {
            Some(s) => parse_time_shift(s),
            None => Ok(0),
        }
    }
}

/// Parse `[-]HH:MM[:SS]` into signed minutes, rounding any seconds
/// remainder down towards zero.
fn parse_time_shift(s: &str) -> Result<i64> {
    let (sign, rest) = match s.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, s),
    };

    let parts: Vec<&str> = rest.split(':').collect();
    let bad = || ContourError::MalformedRecord(format!("bad time-shift {s:?}, expected [-]HH:MM[:SS]"));

    let (hh, mm, ss) = match parts.as_slice() {
        [hh, mm] => (*hh, *mm, "0"),
        [hh, mm, ss] => (*hh, *mm, *ss),
        _ => return Err(bad()),
    };

    let hh: i64 = hh.parse().map_err(|_| bad())?;
    let mm: i64 = mm.parse().map_err(|_| bad())?;
    let ss: i64 = ss.parse().map_err(|_| bad())?;

    Ok(sign * (hh * 60 + mm + ss / 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_hh_mm() {
        assert_eq!(parse_time_shift("01:30").unwrap(), 90);
    }

    #[test]
    fn parses_negative_with_seconds() {
        assert_eq!(parse_time_shift("-02:15:45").unwrap(), -135);
    }

    #[test]
    fn rejects_malformed_shift() {
        assert!(parse_time_shift("garbage").is_err());
    }
}
