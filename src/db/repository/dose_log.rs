use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{format_date, format_datetime, parse_date, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::DoseOutcome;
use crate::models::{DoseLog, TimeOfDay};

/// Insert or supersede the log for `(medication, date, time)`.
///
/// Last write wins; the original row id is kept.
pub fn upsert_dose_log(conn: &Connection, log: &DoseLog) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO dose_logs (id, medication_id, log_date, dose_time, outcome, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (medication_id, log_date, dose_time)
         DO UPDATE SET outcome = excluded.outcome, recorded_at = excluded.recorded_at",
        params![
            log.id.to_string(),
            log.medication_id.to_string(),
            format_date(log.date),
            log.time.to_string(),
            log.outcome.as_str(),
            format_datetime(log.recorded_at),
        ],
    )?;
    Ok(())
}

pub fn get_logs_for_date(conn: &Connection, date: NaiveDate) -> Result<Vec<DoseLog>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, medication_id, log_date, dose_time, outcome, recorded_at
         FROM dose_logs WHERE log_date = ?1
         ORDER BY dose_time ASC",
    )?;
    let rows = stmt.query_map(params![format_date(date)], log_row_from_rusqlite)?;

    let mut logs = Vec::new();
    for row in rows {
        logs.push(log_from_row(row?)?);
    }
    Ok(logs)
}

pub fn count_logs_for_medication(conn: &Connection, medication_id: &Uuid) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM dose_logs WHERE medication_id = ?1",
        params![medication_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

struct LogRow {
    id: String,
    medication_id: String,
    log_date: String,
    dose_time: String,
    outcome: String,
    recorded_at: String,
}

fn log_row_from_rusqlite(row: &Row<'_>) -> rusqlite::Result<LogRow> {
    Ok(LogRow {
        id: row.get(0)?,
        medication_id: row.get(1)?,
        log_date: row.get(2)?,
        dose_time: row.get(3)?,
        outcome: row.get(4)?,
        recorded_at: row.get(5)?,
    })
}

fn log_from_row(row: LogRow) -> Result<DoseLog, DatabaseError> {
    Ok(DoseLog {
        id: parse_uuid("dose_logs.id", &row.id)?,
        medication_id: parse_uuid("dose_logs.medication_id", &row.medication_id)?,
        date: parse_date("dose_logs.log_date", &row.log_date)?,
        time: TimeOfDay::parse(&row.dose_time).map_err(|_| DatabaseError::InvalidValue {
            field: "dose_logs.dose_time".into(),
            value: row.dose_time.clone(),
        })?,
        outcome: DoseOutcome::from_str(&row.outcome)?,
        recorded_at: parse_datetime("dose_logs.recorded_at", &row.recorded_at)?,
    })
}
