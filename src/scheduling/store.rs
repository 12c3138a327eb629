//! Storage seams consumed by the engine, plus the SQLite implementation.
//!
//! Three traits mirror the collaborators the engine depends on:
//! - MedicationStore: active medications/schedules and the delete cascade
//! - DoseLogStore: per-day dose outcomes
//! - EngineSettingsStore: run marker and alarm preferences

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{self, CascadeCounts, DatabaseError};
use crate::models::{AlarmSettings, DoseLog, Medication, MedicationSchedule};

pub trait MedicationStore {
    /// Active medications, creation order.
    fn list_active_medications(&self) -> Result<Vec<Medication>, DatabaseError>;

    fn list_active_schedules(&self) -> Result<Vec<MedicationSchedule>, DatabaseError>;

    fn set_medication_active(&self, id: &Uuid, active: bool) -> Result<(), DatabaseError>;

    /// Remove the medication together with its schedules and logs.
    fn delete_medication_cascade(&self, id: &Uuid) -> Result<CascadeCounts, DatabaseError>;
}

pub trait DoseLogStore {
    fn logs_for_date(&self, date: NaiveDate) -> Result<Vec<DoseLog>, DatabaseError>;

    /// Last write wins per `(medication, date, time)`.
    fn write_log(&self, log: &DoseLog) -> Result<(), DatabaseError>;
}

pub trait EngineSettingsStore {
    fn run_marker(&self) -> Result<Option<NaiveDateTime>, DatabaseError>;

    fn set_run_marker(&self, at: NaiveDateTime) -> Result<(), DatabaseError>;

    fn clear_run_marker(&self) -> Result<(), DatabaseError>;

    fn alarm_settings(&self) -> Result<AlarmSettings, DatabaseError>;

    fn set_alarm_settings(&self, settings: &AlarmSettings) -> Result<(), DatabaseError>;
}

/// Everything the engine needs from persistence.
pub trait ReminderStore: MedicationStore + DoseLogStore + EngineSettingsStore + Send {}

impl<T> ReminderStore for T where T: MedicationStore + DoseLogStore + EngineSettingsStore + Send {}

/// SQLite-backed store owning a single connection.
pub struct SqliteReminderStore {
    conn: Connection,
}

impl SqliteReminderStore {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self {
            conn: db::open_database(path)?,
        })
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self {
            conn: db::open_memory_database()?,
        })
    }

    pub fn add_medication(&self, medication: &Medication) -> Result<(), DatabaseError> {
        db::insert_medication(&self.conn, medication)
    }

    pub fn add_schedule(&self, schedule: &MedicationSchedule) -> Result<(), DatabaseError> {
        db::insert_schedule(&self.conn, schedule)
    }

    pub fn schedules_for(&self, medication_id: &Uuid) -> Result<Vec<MedicationSchedule>, DatabaseError> {
        db::list_schedules_for_medication(&self.conn, medication_id)
    }

    pub fn log_count_for(&self, medication_id: &Uuid) -> Result<i64, DatabaseError> {
        db::count_logs_for_medication(&self.conn, medication_id)
    }

    pub fn medication(&self, id: &Uuid) -> Result<Option<Medication>, DatabaseError> {
        db::get_medication(&self.conn, id)
    }
}

impl MedicationStore for SqliteReminderStore {
    fn list_active_medications(&self) -> Result<Vec<Medication>, DatabaseError> {
        db::list_active_medications(&self.conn)
    }

    fn list_active_schedules(&self) -> Result<Vec<MedicationSchedule>, DatabaseError> {
        db::list_active_schedules(&self.conn)
    }

    fn set_medication_active(&self, id: &Uuid, active: bool) -> Result<(), DatabaseError> {
        db::set_medication_active(&self.conn, id, active)
    }

    fn delete_medication_cascade(&self, id: &Uuid) -> Result<CascadeCounts, DatabaseError> {
        db::delete_medication_cascade(&self.conn, id)
    }
}

impl DoseLogStore for SqliteReminderStore {
    fn logs_for_date(&self, date: NaiveDate) -> Result<Vec<DoseLog>, DatabaseError> {
        db::get_logs_for_date(&self.conn, date)
    }

    fn write_log(&self, log: &DoseLog) -> Result<(), DatabaseError> {
        db::upsert_dose_log(&self.conn, log)
    }
}

impl EngineSettingsStore for SqliteReminderStore {
    fn run_marker(&self) -> Result<Option<NaiveDateTime>, DatabaseError> {
        db::get_run_marker(&self.conn)
    }

    fn set_run_marker(&self, at: NaiveDateTime) -> Result<(), DatabaseError> {
        db::set_run_marker(&self.conn, at)
    }

    fn clear_run_marker(&self) -> Result<(), DatabaseError> {
        db::clear_run_marker(&self.conn)
    }

    fn alarm_settings(&self) -> Result<AlarmSettings, DatabaseError> {
        db::get_alarm_settings(&self.conn)
    }

    fn set_alarm_settings(&self, settings: &AlarmSettings) -> Result<(), DatabaseError> {
        db::set_alarm_settings(&self.conn, settings)
    }
}
