use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub id: Uuid,
    pub name: String,
    pub dosage: String,
    pub unit: String,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

/// Daily dosing times for one medication.
///
/// `times` are raw `HH:MM` wall-clock strings as entered by the user; they are
/// validated when doses are resolved, not when the schedule is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationSchedule {
    pub id: Uuid,
    pub medication_id: Uuid,
    pub times: Vec<String>,
    pub is_active: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
}

impl MedicationSchedule {
    /// Whether `date` falls inside the optional, inclusive date range.
    pub fn covers(&self, date: NaiveDate) -> bool {
        let after_start = self.start_date.map_or(true, |start| date >= start);
        let before_end = self.end_date.map_or(true, |end| date <= end);
        after_start && before_end
    }
}
