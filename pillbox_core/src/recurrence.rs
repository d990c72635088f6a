//! Weekday recurrence and time-of-day types for dose rules.
//!
//! These are the two bit-exact contracts shared with any serialization
//! layer:
//! - weekdays are indexed 0=Sunday..6=Saturday
//! - times are zero-padded 24-hour `HH:MM` strings
//!
//! Older data stores the weekday set as a JSON text column (`"[1,3,5]"`).
//! `Recurrence::from_days_text` and `to_days_text` are the boundary for that
//! legacy form; dose specs accept it after `@` as well.
//!
//! Validation happens once, when a value enters the system (parsing or
//! deserialization). After that, the projector and resolver work on typed
//! values and cannot fail on malformed schedule data.

use crate::{DoseRule, Error, Result};
use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Weekday sets
// ============================================================================

/// A set of weekdays stored as a 7-bit mask (bit 0 = Sunday).
///
/// Serialized as a JSON array of weekday indices, e.g. `[0, 6]` for
/// Sunday and Saturday.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    /// Build a set from weekday indices, rejecting anything outside 0..=6
    pub fn from_indices(indices: &[u8]) -> Result<Self> {
        let mut bits = 0u8;
        for &index in indices {
            if index > 6 {
                return Err(Error::ScheduleData(format!(
                    "weekday index {} is outside 0..=6",
                    index
                )));
            }
            bits |= 1 << index;
        }
        Ok(Self(bits))
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_sunday()) != 0
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_sunday();
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Weekday indices in ascending order
    pub fn indices(&self) -> Vec<u8> {
        (0..7u8).filter(|i| self.0 & (1 << i) != 0).collect()
    }
}

impl TryFrom<Vec<u8>> for WeekdaySet {
    type Error = Error;

    fn try_from(indices: Vec<u8>) -> Result<Self> {
        Self::from_indices(&indices)
    }
}

impl From<WeekdaySet> for Vec<u8> {
    fn from(set: WeekdaySet) -> Self {
        set.indices()
    }
}

// ============================================================================
// Recurrence
// ============================================================================

/// When a dose rule fires.
///
/// `Daily` is encoded as `null` (or an absent field). `Weekly` is always an
/// explicit array; an empty array is a valid rule that never fires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Option<Vec<u8>>", into = "Option<Vec<u8>>")]
pub enum Recurrence {
    #[default]
    Daily,
    Weekly(WeekdaySet),
}

impl Recurrence {
    pub fn is_active_on(&self, day: Weekday) -> bool {
        match self {
            Recurrence::Daily => true,
            Recurrence::Weekly(days) => days.contains(day),
        }
    }

    /// Parse the legacy textual `days` column.
    ///
    /// `None` or blank text means every day. Anything else must be a JSON
    /// array of integers in 0..=6.
    pub fn from_days_text(text: Option<&str>) -> Result<Self> {
        let text = match text.map(str::trim) {
            None | Some("") => return Ok(Recurrence::Daily),
            Some(text) => text,
        };

        let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
            Error::ScheduleData(format!("days {:?} is not valid JSON: {}", text, e))
        })?;

        let entries = value.as_array().ok_or_else(|| {
            Error::ScheduleData(format!("days {:?} is not an array", text))
        })?;

        let mut indices = Vec::with_capacity(entries.len());
        for entry in entries {
            let index = entry
                .as_u64()
                .filter(|i| *i <= 6)
                .ok_or_else(|| {
                    Error::ScheduleData(format!(
                        "days {:?} contains {} which is not a weekday index",
                        text, entry
                    ))
                })?;
            indices.push(index as u8);
        }

        Ok(Recurrence::Weekly(WeekdaySet::from_indices(&indices)?))
    }

    /// Inverse of [`Recurrence::from_days_text`]
    pub fn to_days_text(&self) -> Option<String> {
        match self {
            Recurrence::Daily => None,
            Recurrence::Weekly(days) => {
                let items: Vec<String> = days.indices().iter().map(u8::to_string).collect();
                Some(format!("[{}]", items.join(",")))
            }
        }
    }
}

impl TryFrom<Option<Vec<u8>>> for Recurrence {
    type Error = Error;

    fn try_from(days: Option<Vec<u8>>) -> Result<Self> {
        match days {
            None => Ok(Recurrence::Daily),
            Some(indices) => Ok(Recurrence::Weekly(WeekdaySet::from_indices(&indices)?)),
        }
    }
}

impl From<Recurrence> for Option<Vec<u8>> {
    fn from(recurrence: Recurrence) -> Self {
        match recurrence {
            Recurrence::Daily => None,
            Recurrence::Weekly(days) => Some(days.indices()),
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
        match self {
            Recurrence::Daily => write!(f, "daily"),
            Recurrence::Weekly(days) => {
                let names: Vec<&str> = days
                    .indices()
                    .iter()
                    .map(|i| NAMES[*i as usize])
                    .collect();
                write!(f, "{}", names.join(","))
            }
        }
    }
}

// ============================================================================
// Time of day
// ============================================================================

/// A validated `HH:MM` time of day in device-local time.
///
/// Field order makes the derived ordering chronological, which also matches
/// lexicographic ordering of the zero-padded text form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DoseTime {
    hour: u8,
    minute: u8,
}

impl DoseTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(Error::InvalidTime(format!("{:02}:{:02}", hour, minute)));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn to_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour.into(), self.minute.into(), 0).unwrap_or_default()
    }
}

impl FromStr for DoseTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidTime(s.to_string());
        let bytes = s.as_bytes();

        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(invalid());
        }
        let digits = [bytes[0], bytes[1], bytes[3], bytes[4]];
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(invalid());
        }

        let hour = (bytes[0] - b'0') * 10 + (bytes[1] - b'0');
        let minute = (bytes[3] - b'0') * 10 + (bytes[4] - b'0');
        Self::new(hour, minute).map_err(|_| invalid())
    }
}

impl TryFrom<String> for DoseTime {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<DoseTime> for String {
    fn from(time: DoseTime) -> Self {
        time.to_string()
    }
}

impl fmt::Display for DoseTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

// ============================================================================
// Dose spec shorthand
// ============================================================================

/// Parse the `HH:MM[xQTY][@DAYS]` shorthand into a new dose rule.
///
/// DAYS is a comma separated list of weekday indices or three-letter names,
/// or the legacy bracketed index array:
/// `08:00`, `20:30x2`, `09:00x0.5@mon,wed,fri`, `07:15@0,6`, `07:15@[0,6]`.
pub fn parse_dose_spec(spec: &str) -> Result<DoseRule> {
    let spec = spec.trim();
    let (head, days) = match spec.split_once('@') {
        Some((head, days)) => (head, Some(days)),
        None => (spec, None),
    };

    let (time, quantity) = match head.split_once(['x', 'X']) {
        Some((time, qty)) => {
            let quantity: f64 = qty
                .trim()
                .parse()
                .map_err(|_| Error::InvalidQuantity(qty.trim().to_string()))?;
            (time, quantity)
        }
        None => (head, 1.0),
    };

    let time: DoseTime = time.trim().parse()?;
    let recurrence = match days {
        None => Recurrence::Daily,
        Some(days) if days.trim_start().starts_with('[') => {
            Recurrence::from_days_text(Some(days))?
        }
        Some(days) => Recurrence::Weekly(parse_day_list(days)?),
    };

    DoseRule::new(time, quantity, recurrence)
}

fn parse_day_list(list: &str) -> Result<WeekdaySet> {
    let mut set = WeekdaySet::default();
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let day = match item.parse::<u8>() {
            Ok(index) => weekday_from_index(index)?,
            Err(_) => item.parse::<Weekday>().map_err(|_| {
                Error::ScheduleData(format!("{:?} is not a weekday", item))
            })?,
        };
        set.insert(day);
    }
    Ok(set)
}

/// Map a 0=Sunday weekday index to a chrono weekday
pub fn weekday_from_index(index: u8) -> Result<Weekday> {
    match index {
        0 => Ok(Weekday::Sun),
        1 => Ok(Weekday::Mon),
        2 => Ok(Weekday::Tue),
        3 => Ok(Weekday::Wed),
        4 => Ok(Weekday::Thu),
        5 => Ok(Weekday::Fri),
        6 => Ok(Weekday::Sat),
        other => Err(Error::ScheduleData(format!(
            "weekday index {} is outside 0..=6",
            other
        ))),
    }
}
