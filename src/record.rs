//! The parsed record model: one glucose/insulin/carb measurement plus the
//! index and timestamp ASTM carries alongside it.

use bitflags::bitflags;

use crate::datetime::CivilDateTime;
use crate::error::{ContourError, Result};

bitflags! {
    /// Single-letter annotation flags carried in the Glucose tags sub-field.
    /// Meaningless for any other kind.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Tags: u8 {
        const CONTROL          = 1 << 0;
        const BEFORE_FOOD      = 1 << 1;
        const AFTER_FOOD       = 1 << 2;
        const DONT_FEEL_RIGHT  = 1 << 3;
        const SICK             = 1 << 4;
        const STRESS           = 1 << 5;
        const ACTIVITY         = 1 << 6;
    }
}

/// Fixed print order for tag letters: `C B A D I S X`.
const TAG_LETTER_ORDER: [(Tags, char); 7] = [
    (Tags::CONTROL, 'C'),
    (Tags::BEFORE_FOOD, 'B'),
    (Tags::AFTER_FOOD, 'A'),
    (Tags::DONT_FEEL_RIGHT, 'D'),
    (Tags::SICK, 'I'),
    (Tags::STRESS, 'S'),
    (Tags::ACTIVITY, 'X'),
];

impl Tags {
    fn from_letter(c: char) -> Option<Tags> {
        TAG_LETTER_ORDER.iter().find(|(_, l)| *l == c).map(|(t, _)| *t)
    }

    fn to_letters(self) -> String {
        TAG_LETTER_ORDER
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, c)| *c)
            .collect()
    }
}

/// Parsed form of the Glucose tags sub-field: letter tags in any order,
/// `<`/`>` overriding the value to the low/high sentinel, `/` as an ignored
/// separator, and `Z<hex>` setting `AfterFood` plus minutes-since-meal in
/// 15-minute quanta.
pub fn parse_glucose_tags_field(s: &str) -> Result<(Tags, u8, Option<u16>)> {
    let mut tags = Tags::empty();
    let mut minutes_after_meal = 0u8;
    let mut value_override = None;

    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '/' => {}
            '<' => value_override = Some(9),
            '>' => value_override = Some(601),
            'Z' => {
                let digit = chars.next().ok_or_else(|| {
                    ContourError::MalformedRecord(format!("truncated Z quantum in tags field {s:?}"))
                })?;
                let quantum = digit.to_digit(16).ok_or_else(|| {
                    ContourError::MalformedRecord(format!("bad Z quantum digit {digit:?} in {s:?}"))
                })?;
                minutes_after_meal = (quantum * 15) as u8;
                tags |= Tags::AFTER_FOOD;
            }
            other => match Tags::from_letter(other) {
                Some(flag) => tags |= flag,
                None => {
                    return Err(ContourError::MalformedRecord(format!(
                        "unrecognized tag letter {other:?} in {s:?}"
                    )))
                }
            },
        }
    }

    Ok((tags, minutes_after_meal, value_override))
}

/// Format minutes-since-meal back into the `Z<hex>` sub-field text, e.g. 0
/// minutes -> `Z0`, 225 minutes (the maximum one hex digit can express) ->
/// `ZF`.
pub fn format_post_meal_quantum(minutes_after_meal: u8) -> String {
    let quantum = (minutes_after_meal / 15).min(0xF);
    format!("Z{quantum:X}")
}

/// The kind of measurement a record carries, used for filtering without
/// matching on the full `Measurement` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Glucose,
    InsulinShort,
    InsulinLong,
    Carbs,
    Unknown,
}

/// The sum type of everything an R record can report: each variant owns
/// exactly the fields that measurement kind has, rather than overloading
/// one struct's tag bits across four unrelated kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    Glucose { value: u16, tags: Tags, minutes_after_meal: u8 },
    InsulinShort { units: u16 },
    InsulinLong { units: u16 },
    Carbs { grams: u16 },
    Unknown { value: u16 },
}

impl Measurement {
    pub fn kind(&self) -> RecordKind {
        match self {
            Measurement::Glucose { .. } => RecordKind::Glucose,
            Measurement::InsulinShort { .. } => RecordKind::InsulinShort,
            Measurement::InsulinLong { .. } => RecordKind::InsulinLong,
            Measurement::Carbs { .. } => RecordKind::Carbs,
            Measurement::Unknown { .. } => RecordKind::Unknown,
        }
    }

    /// `minutes_after_meal / 60`, zero for every non-Glucose kind.
    pub fn hours_after_meal(&self) -> u8 {
        match self {
            Measurement::Glucose { minutes_after_meal, .. } => minutes_after_meal / 60,
            _ => 0,
        }
    }

    pub fn minutes_after_meal(&self) -> u8 {
        match self {
            Measurement::Glucose { minutes_after_meal, .. } => *minutes_after_meal,
            _ => 0,
        }
    }

    pub fn is_after_meal(&self) -> bool {
        match self {
            Measurement::Glucose { tags, .. } => tags.contains(Tags::AFTER_FOOD),
            _ => false,
        }
    }
}

/// One parsed R record: sequence index, timestamp, and a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub index: u32,
    pub timestamp: CivilDateTime,
    pub measurement: Measurement,
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        self.measurement.kind()
    }

    pub fn is_after_meal(&self) -> bool {
        self.measurement.is_after_meal()
    }

    /// Shift only the timestamp by `delta_minutes`; no other field changes.
    /// Used to correct a meter clock set to the wrong time.
    pub fn shift_time(&self, delta_minutes: i64) -> Record {
        Record { timestamp: self.timestamp.shift_minutes(delta_minutes), ..*self }
    }

    fn kind_name(&self) -> &'static str {
        match self.measurement {
            Measurement::Glucose { .. } => "Glucose",
            Measurement::InsulinShort { .. } | Measurement::InsulinLong { .. } => "Insulin",
            Measurement::Carbs { .. } => "Carb",
            Measurement::Unknown { .. } => "Unknown",
        }
    }

    fn value(&self) -> u16 {
        match self.measurement {
            Measurement::Glucose { value, .. } => value,
            Measurement::InsulinShort { units } | Measurement::InsulinLong { units } => units,
            Measurement::Carbs { grams } => grams,
            Measurement::Unknown { value } => value,
        }
    }

    fn unit_suffix(&self) -> &'static str {
        match self.measurement {
            Measurement::Glucose { .. } => "mg/dL^P",
            Measurement::InsulinShort { .. } => "1^",
            Measurement::InsulinLong { .. } => "2^",
            Measurement::Carbs { .. } => "1^",
            Measurement::Unknown { .. } => "",
        }
    }

    fn tags_field(&self) -> String {
        match self.measurement {
            Measurement::Glucose { tags, minutes_after_meal, .. } => {
                let letters = tags.to_letters();
                if minutes_after_meal > 0 {
                    format!("{letters}/{}", format_post_meal_quantum(minutes_after_meal))
                } else {
                    letters
                }
            }
            _ => String::new(),
        }
    }

    /// Render as the wire-format text of an R record (minus frame bytes).
    ///
    /// The worked examples this follows put two empty fields between the
    /// tags field and the timestamp, one more than the field-by-field prose
    /// enumerates; see the tags/timestamp gap note in `DESIGN.md`.
    pub fn to_bayer_line(&self) -> String {
        format!(
            "R|{}|^^^{}|{}|{}||{}|||{}",
            self.index,
            self.kind_name(),
            self.value(),
            self.unit_suffix(),
            self.tags_field(),
            self.timestamp.to_bayer_field(),
        )
    }

    /// Render as one CSV row.
    pub fn to_csv_line(&self) -> String {
        let datetime = self.timestamp.to_csv_field();
        match self.measurement {
            Measurement::Glucose { value, tags, minutes_after_meal } => {
                let before_after = if tags.contains(Tags::BEFORE_FOOD) {
                    "1"
                } else if tags.contains(Tags::AFTER_FOOD) {
                    "2"
                } else {
                    ""
                };
                let flag = |t: Tags| if tags.contains(t) { "1" } else { "" };
                let mut line = format!(
                    "{datetime},{value},{before_after},{},{},{}",
                    flag(Tags::DONT_FEEL_RIGHT),
                    flag(Tags::SICK),
                    flag(Tags::STRESS),
                );
                line.push_str(&format!(",{}", flag(Tags::ACTIVITY)));
                if minutes_after_meal > 0 {
                    line.push_str(&format!(",{}", minutes_after_meal / 60));
                }
                line
            }
            Measurement::InsulinShort { units } => format!("{datetime},{units},-1"),
            Measurement::InsulinLong { units } => format!("{datetime},{units},-2"),
            Measurement::Carbs { grams } => format!("{datetime},{grams},-3"),
            Measurement::Unknown { value } => format!("{datetime},{value}"),
        }
    }
}
