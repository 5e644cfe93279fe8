//! Turns ASTM record-text lines (already stripped of frame control bytes)
//! into [`ParsedLine`] values.

use crate::datetime::CivilDateTime;
use crate::error::{ContourError, Result};
use crate::record::{parse_glucose_tags_field, Measurement, Record};

/// The four delimiter characters an ASTM session declares in its H record,
/// e.g. `\^&` after the field delimiter in `H|\^&|...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    pub field: char,
    pub repeat: char,
    pub component: char,
    pub escape: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Delimiters { field: '|', repeat: '\\', component: '^', escape: '&' }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderInfo {
    pub delimiters: Delimiters,
    pub raw: String,
}

/// One dispatched, parsed line of ASTM record text.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Header(HeaderInfo),
    Patient,
    Measurement(Record),
    Terminator,
}

/// Stateful line dispatcher; holds the delimiters declared by the session's
/// header record so later records can be split consistently.
#[derive(Debug, Clone)]
pub struct RecordParser {
    delimiters: Delimiters,
}

impl RecordParser {
    pub fn new() -> Self {
        Self { delimiters: Delimiters::default() }
    }

    pub fn parse_line(&mut self, line: &str) -> Result<ParsedLine> {
        let mut chars = line.chars();
        let leading = chars.next().ok_or(ContourError::MalformedRecord("empty line".into()))?;

        match leading {
            'H' => {
                let header = self.parse_header(line)?;
                self.delimiters = header.delimiters;
                Ok(ParsedLine::Header(header))
            }
            'P' => Ok(ParsedLine::Patient),
            'R' => Ok(ParsedLine::Measurement(self.parse_record(line)?)),
            'L' => Ok(ParsedLine::Terminator),
            'O' => Err(ContourError::UnsupportedRecord),
            other => Err(ContourError::UnparseableLine(other)),
        }
    }

    fn parse_header(&self, line: &str) -> Result<HeaderInfo> {
        let rest = &line[1..];
        let field = self.delimiters.field;
        let mut fields = rest.splitn(2, field);
        let _empty_before_delims = fields.next();
        let delim_field = fields.next().ok_or(ContourError::MalformedFrame(
            "header record missing delimiter definition field",
        ))?;
        let delim_chars: Vec<char> = delim_field.chars().take(3).collect();
        let delimiters = match delim_chars.as_slice() {
            [repeat, component, escape] => {
                Delimiters { field, repeat: *repeat, component: *component, escape: *escape }
            }
            _ => {
                return Err(ContourError::MalformedFrame(
                    "header record delimiter definition is not 3 characters",
                ))
            }
        };
        Ok(HeaderInfo { delimiters, raw: line.to_string() })
    }

    /// Last non-empty component-separated segment of `field`, used to
    /// recognize the test identifier and the leading unit component.
    fn last_component<'a>(&self, field: &'a str) -> &'a str {
        field.split(self.delimiters.component).filter(|s| !s.is_empty()).next_back().unwrap_or("")
    }

    fn leading_component<'a>(&self, field: &'a str) -> &'a str {
        field.split(self.delimiters.component).next().unwrap_or("")
    }

    fn parse_record(&self, line: &str) -> Result<Record> {
        let field = self.delimiters.field;
        let tokens: Vec<&str> = line.split(field).collect();
        if tokens.len() != 10 || tokens[0] != "R" {
            return Err(ContourError::MalformedRecord(format!(
                "expected 10 pipe-delimited fields in R record, got {}: {line:?}",
                tokens.len()
            )));
        }

        let index: u32 = tokens[1]
            .parse()
            .map_err(|_| ContourError::MalformedRecord(format!("bad record index {:?}", tokens[1])))?;
        let test_id = tokens[2];
        let raw_value = tokens[3];
        let unit_field = tokens[4];
        let tags_field = tokens[6];
        let timestamp_field = tokens[9];

        let timestamp = CivilDateTime::parse(timestamp_field)?;
        let value: u16 = raw_value
            .parse()
            .map_err(|_| ContourError::MalformedRecord(format!("bad record value {raw_value:?}")))?;

        let test_name = self.last_component(test_id).to_ascii_lowercase();
        let measurement = match test_name.as_str() {
            "glucose" => {
                let (tags, minutes_after_meal, value_override) = parse_glucose_tags_field(tags_field)?;
                Measurement::Glucose { value: value_override.unwrap_or(value), tags, minutes_after_meal }
            }
            "insulin" => match self.leading_component(unit_field) {
                "1" => Measurement::InsulinShort { units: value },
                "2" => Measurement::InsulinLong { units: value },
                other => {
                    return Err(ContourError::MalformedRecord(format!(
                        "insulin record has unrecognized short/long qualifier {other:?}"
                    )))
                }
            },
            "carb" => Measurement::Carbs { grams: value },
            _ => Measurement::Unknown { value },
        };

        Ok(Record { index, timestamp, measurement })
    }
}

impl Default for RecordParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Tags;

    #[test]
    fn parses_header_and_adopts_delimiters() {
        let mut p = RecordParser::new();
        match p.parse_line("H|\\^&").unwrap() {
            ParsedLine::Header(h) => {
                assert_eq!(h.delimiters, Delimiters::default());
            }
            other => panic!("expected Header, got {other:?}"),
        }
    }

    #[test]
    fn parses_glucose_record_from_worked_example() {
        let mut p = RecordParser::new();
        let line = "R|1|^^^Glucose|105|mg/dL^P||B/Z4|||201501021530";
        match p.parse_line(line).unwrap() {
            ParsedLine::Measurement(r) => {
                assert_eq!(r.index, 1);
                assert_eq!(r.timestamp.year, 2015);
                match r.measurement {
                    Measurement::Glucose { value: 105, tags, minutes_after_meal: 60 } => {
                        assert_eq!(tags, Tags::BEFORE_FOOD | Tags::AFTER_FOOD);
                    }
                    other => panic!("unexpected measurement {other:?}"),
                }
            }
            other => panic!("expected Measurement, got {other:?}"),
        }
    }

    #[test]
    fn parses_insulin_short_record_from_worked_example() {
        let mut p = RecordParser::new();
        let line = "R|7|^^^Insulin|12|1^|||||201503041200";
        match p.parse_line(line).unwrap() {
            ParsedLine::Measurement(r) => {
                assert_eq!(r.measurement, Measurement::InsulinShort { units: 12 });
            }
            other => panic!("expected Measurement, got {other:?}"),
        }
    }

    #[test]
    fn parses_carbs_record_from_worked_example() {
        let mut p = RecordParser::new();
        let line = "R|8|^^^Carb|45|1^|||||201503041205";
        match p.parse_line(line).unwrap() {
            ParsedLine::Measurement(r) => {
                assert_eq!(r.measurement, Measurement::Carbs { grams: 45 });
            }
            other => panic!("expected Measurement, got {other:?}"),
        }
    }

    #[test]
    fn glucose_value_overridden_by_low_sentinel_tag() {
        let mut p = RecordParser::new();
        let line = "R|1|^^^Glucose|999|mg/dL^P||<|||201501021530";
        match p.parse_line(line).unwrap() {
            ParsedLine::Measurement(r) => match r.measurement {
                Measurement::Glucose { value: 9, .. } => {}
                other => panic!("unexpected measurement {other:?}"),
            },
            other => panic!("expected Measurement, got {other:?}"),
        }
    }

    #[test]
    fn order_record_is_unsupported() {
        let mut p = RecordParser::new();
        match p.parse_line("O|1|") {
            Err(ContourError::UnsupportedRecord) => {}
            other => panic!("expected UnsupportedRecord, got {other:?}"),
        }
    }

    #[test]
    fn terminator_record_recognized() {
        let mut p = RecordParser::new();
        assert_eq!(p.parse_line("L|1|N").unwrap(), ParsedLine::Terminator);
    }

    #[test]
    fn unrecognized_leading_char_is_rejected() {
        let mut p = RecordParser::new();
        match p.parse_line("X|1") {
            Err(ContourError::UnparseableLine('X')) => {}
            other => panic!("expected UnparseableLine('X'), got {other:?}"),
        }
    }

    #[test]
    fn wrong_field_count_is_malformed() {
        let mut p = RecordParser::new();
        assert!(p.parse_line("R|1|^^^Glucose|105").is_err());
    }
}
