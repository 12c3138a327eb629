use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::enums::{DoseOutcome, DoseStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DoseParseError {
    #[error("invalid time of day {0:?}, expected HH:MM")]
    Time(String),
    #[error("invalid dose key {0:?}, expected <medication-id>@HH:MM")]
    Key(String),
}

// ═══════════════════════════════════════════
// TimeOfDay
// ═══════════════════════════════════════════

/// Minute-precision local wall-clock time, no timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// Parse `HH:MM` (a single-digit hour is tolerated, minutes must be two digits).
    pub fn parse(raw: &str) -> Result<Self, DoseParseError> {
        let invalid = || DoseParseError::Time(raw.to_string());
        let (hour, minute) = raw.trim().split_once(':').ok_or_else(invalid)?;

        let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(hour) || hour.len() > 2 || !all_digits(minute) || minute.len() != 2 {
            return Err(invalid());
        }

        let hour: u32 = hour.parse().map_err(|_| invalid())?;
        let minute: u32 = minute.parse().map_err(|_| invalid())?;
        Self::new(hour, minute).ok_or_else(invalid)
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    /// The instant this time of day occurs on `date`.
    pub fn on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.0)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = DoseParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = DoseParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

// ═══════════════════════════════════════════
// DoseKey
// ═══════════════════════════════════════════

/// Identity of one daily dose: a medication at a time of day.
///
/// Correlates schedules, dose logs and OS notifications. Canonical text form
/// is `<medication-id>@HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoseKey {
    pub medication_id: Uuid,
    pub time: TimeOfDay,
}

impl DoseKey {
    pub fn new(medication_id: Uuid, time: TimeOfDay) -> Self {
        Self {
            medication_id,
            time,
        }
    }
}

impl fmt::Display for DoseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.medication_id, self.time)
    }
}

impl FromStr for DoseKey {
    type Err = DoseParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DoseParseError::Key(s.to_string());
        let (id, time) = s.rsplit_once('@').ok_or_else(invalid)?;
        let medication_id = Uuid::parse_str(id).map_err(|_| invalid())?;
        let time = TimeOfDay::parse(time).map_err(|_| invalid())?;
        Ok(Self::new(medication_id, time))
    }
}

// ═══════════════════════════════════════════
// ScheduledDose / DoseLog
// ═══════════════════════════════════════════

/// One dose due today, as rendered by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledDose {
    pub key: DoseKey,
    pub medication_name: String,
    pub dosage: String,
    pub unit: String,
    pub status: DoseStatus,
}

impl ScheduledDose {
    pub fn is_pending(&self) -> bool {
        self.status == DoseStatus::Pending
    }

    pub fn due_at(&self, date: NaiveDate) -> NaiveDateTime {
        self.key.time.on(date)
    }
}

/// Persisted outcome for a `(medication, date, time)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoseLog {
    pub id: Uuid,
    pub medication_id: Uuid,
    pub date: NaiveDate,
    pub time: TimeOfDay,
    pub outcome: DoseOutcome,
    pub recorded_at: NaiveDateTime,
}

impl DoseLog {
    pub fn new(key: DoseKey, date: NaiveDate, outcome: DoseOutcome, recorded_at: NaiveDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            medication_id: key.medication_id,
            date,
            time: key.time,
            outcome,
            recorded_at,
        }
    }

    pub fn key(&self) -> DoseKey {
        DoseKey::new(self.medication_id, self.time)
    }
}
