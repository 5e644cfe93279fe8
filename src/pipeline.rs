//! Turns a stream of parsed lines into a filtered, optionally time-shifted
//! batch of records, and renders that batch to text.

use log::info;

use crate::error::Result;
use crate::parser::{ParsedLine, RecordParser};
use crate::record::{Record, RecordKind};
use crate::session::{Session, SyncOutcome};
use crate::transport::Channel;

bitflags::bitflags! {
    /// Which record kinds, and which meal timing, survive into the output.
    /// With no bits set, everything passes (the CLI's default). As soon as
    /// one of the kind bits is set, only the named kinds pass; `AFTER_MEAL_ONLY`
    /// further restricts output to records with `minutes_after_meal > 0`
    /// regardless of which kind bits are set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RecordFilter: u8 {
        const GLUCOSE          = 1 << 0;
        const INSULIN_SHORT    = 1 << 1;
        const INSULIN_LONG     = 1 << 2;
        const CARBS            = 1 << 3;
        const AFTER_MEAL_ONLY  = 1 << 4;
    }
}

const KIND_BITS: RecordFilter = RecordFilter::GLUCOSE
    .union(RecordFilter::INSULIN_SHORT)
    .union(RecordFilter::INSULIN_LONG)
    .union(RecordFilter::CARBS);

impl RecordFilter {
    pub fn matches(self, record: &Record) -> bool {
        let kind_ok = if self.intersects(KIND_BITS) {
            match record.kind() {
                RecordKind::Glucose => self.contains(RecordFilter::GLUCOSE),
                RecordKind::InsulinShort => self.contains(RecordFilter::INSULIN_SHORT),
                RecordKind::InsulinLong => self.contains(RecordFilter::INSULIN_LONG),
                RecordKind::Carbs => self.contains(RecordFilter::CARBS),
                RecordKind::Unknown => false,
            }
        } else {
            true
        };
        let meal_ok = !self.contains(RecordFilter::AFTER_MEAL_ONLY) || record.is_after_meal();
        kind_ok && meal_ok
    }
}

impl Default for RecordFilter {
    fn default() -> Self {
        RecordFilter::empty()
    }
}

/// Collect every record a live meter reports over `channel`, applying
/// `filter` and `shift_minutes` before returning them.
pub fn collect_live<C: Channel>(
    channel: C,
    filter: RecordFilter,
    shift_minutes: i64,
) -> Result<Vec<Record>> {
    let mut session = Session::new(channel);
    let mut parser = RecordParser::new();
    let mut records = Vec::new();

    loop {
        match session.sync()? {
            SyncOutcome::EndOfStream => break,
            SyncOutcome::Line(line) => {
                if let ParsedLine::Measurement(record) = parser.parse_line(&line)? {
                    push_record(&mut records, record, filter, shift_minutes);
                }
            }
        }
    }

    info!("collected {} records from live session", records.len());
    Ok(records)
}

/// Collect every record out of already-captured ASTM text lines (e.g. from
/// a saved transcript file), applying `filter` and `shift_minutes`.
pub fn collect_from_lines<'a, I: IntoIterator<Item = &'a str>>(
    lines: I,
    filter: RecordFilter,
    shift_minutes: i64,
) -> Result<Vec<Record>> {
    let mut parser = RecordParser::new();
    let mut records = Vec::new();

    for line in lines {
        match parser.parse_line(line)? {
            ParsedLine::Measurement(record) => push_record(&mut records, record, filter, shift_minutes),
            ParsedLine::Header(_) | ParsedLine::Patient | ParsedLine::Terminator => {}
        }
    }

    Ok(records)
}

fn push_record(records: &mut Vec<Record>, record: Record, filter: RecordFilter, shift_minutes: i64) {
    let record = if shift_minutes != 0 { record.shift_time(shift_minutes) } else { record };
    if filter.matches(&record) {
        records.push(record);
    }
}

/// Render records as the wire-like "Bayer" text form, one line each.
pub fn render_bayer(records: &[Record]) -> String {
    records.iter().map(Record::to_bayer_line).collect::<Vec<_>>().join("\n")
}

/// Render records as CSV, one row each.
pub fn render_csv(records: &[Record]) -> String {
    records.iter().map(Record::to_csv_line).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const GLUCOSE_LINE: &str = "R|1|^^^Glucose|105|mg/dL^P||B|||201501021530";
    const AFTER_MEAL_LINE: &str = "R|2|^^^Glucose|150|mg/dL^P||A/Z4|||201501021545";
    const INSULIN_LINE: &str = "R|3|^^^Insulin|4|1^|||||201501021600";

    #[test]
    fn default_filter_passes_everything() {
        let records =
            collect_from_lines([GLUCOSE_LINE, AFTER_MEAL_LINE, INSULIN_LINE], RecordFilter::default(), 0)
                .unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn narrowed_filter_excludes_other_kinds() {
        let filter = RecordFilter::GLUCOSE;
        let records = collect_from_lines([GLUCOSE_LINE, INSULIN_LINE], filter, 0).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind(), RecordKind::Glucose);
    }

    #[test]
    fn after_meal_only_requires_after_meal_tag() {
        let filter = RecordFilter::AFTER_MEAL_ONLY;
        let records = collect_from_lines([GLUCOSE_LINE, AFTER_MEAL_LINE], filter, 0).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_after_meal());
    }

    #[test]
    fn shift_minutes_applies_before_filtering() {
        let records = collect_from_lines([GLUCOSE_LINE], RecordFilter::default(), 30).unwrap();
        assert_eq!(records[0].timestamp.minute, 0);
        assert_eq!(records[0].timestamp.hour, 16);
    }

    #[test]
    fn csv_render_has_one_row_per_record() {
        let records = collect_from_lines([GLUCOSE_LINE], RecordFilter::default(), 0).unwrap();
        let csv = render_csv(&records);
        assert_eq!(csv.lines().count(), 1);
    }
}
