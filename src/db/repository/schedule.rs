use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{format_date, format_datetime, parse_date, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::MedicationSchedule;

const SCHEDULE_COLUMNS: &str =
    "id, medication_id, times, is_active, start_date, end_date, created_at";

pub fn insert_schedule(conn: &Connection, schedule: &MedicationSchedule) -> Result<(), DatabaseError> {
    let times = serde_json::to_string(&schedule.times)?;
    conn.execute(
        "INSERT INTO medication_schedules (id, medication_id, times, is_active, start_date, end_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            schedule.id.to_string(),
            schedule.medication_id.to_string(),
            times,
            schedule.is_active as i32,
            schedule.start_date.map(format_date),
            schedule.end_date.map(format_date),
            format_datetime(schedule.created_at),
        ],
    )?;
    Ok(())
}

/// Active schedules in creation order. Whether the owning medication is
/// active is left to the resolver.
pub fn list_active_schedules(conn: &Connection) -> Result<Vec<MedicationSchedule>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SCHEDULE_COLUMNS} FROM medication_schedules
         WHERE is_active = 1
         ORDER BY created_at ASC, rowid ASC"
    ))?;
    let rows = stmt.query_map([], schedule_row_from_rusqlite)?;

    let mut schedules = Vec::new();
    for row in rows {
        schedules.push(schedule_from_row(row?)?);
    }
    Ok(schedules)
}

pub fn list_schedules_for_medication(
    conn: &Connection,
    medication_id: &Uuid,
) -> Result<Vec<MedicationSchedule>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SCHEDULE_COLUMNS} FROM medication_schedules
         WHERE medication_id = ?1
         ORDER BY created_at ASC, rowid ASC"
    ))?;
    let rows = stmt.query_map(params![medication_id.to_string()], schedule_row_from_rusqlite)?;

    let mut schedules = Vec::new();
    for row in rows {
        schedules.push(schedule_from_row(row?)?);
    }
    Ok(schedules)
}

struct ScheduleRow {
    id: String,
    medication_id: String,
    times: String,
    is_active: i32,
    start_date: Option<String>,
    end_date: Option<String>,
    created_at: String,
}

fn schedule_row_from_rusqlite(row: &Row<'_>) -> rusqlite::Result<ScheduleRow> {
    Ok(ScheduleRow {
        id: row.get(0)?,
        medication_id: row.get(1)?,
        times: row.get(2)?,
        is_active: row.get(3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn schedule_from_row(row: ScheduleRow) -> Result<MedicationSchedule, DatabaseError> {
    Ok(MedicationSchedule {
        id: parse_uuid("medication_schedules.id", &row.id)?,
        medication_id: parse_uuid("medication_schedules.medication_id", &row.medication_id)?,
        times: serde_json::from_str(&row.times)?,
        is_active: row.is_active != 0,
        start_date: row
            .start_date
            .as_deref()
            .map(|d| parse_date("medication_schedules.start_date", d))
            .transpose()?,
        end_date: row
            .end_date
            .as_deref()
            .map(|d| parse_date("medication_schedules.end_date", d))
            .transpose()?,
        created_at: parse_datetime("medication_schedules.created_at", &row.created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::insert_medication;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Medication;
    use chrono::{NaiveDate, NaiveDateTime};

    fn created() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(8, 0, 0).unwrap()
    }

    fn seed_medication(conn: &Connection) -> Uuid {
        let med = Medication {
            id: Uuid::new_v4(),
            name: "Atorvastatin".into(),
            dosage: "20".into(),
            unit: "mg".into(),
            is_active: true,
            created_at: created(),
        };
        insert_medication(conn, &med).unwrap();
        med.id
    }

    fn schedule(medication_id: Uuid, times: &[&str]) -> MedicationSchedule {
        MedicationSchedule {
            id: Uuid::new_v4(),
            medication_id,
            times: times.iter().map(|t| t.to_string()).collect(),
            is_active: true,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1),
            end_date: None,
            created_at: created(),
        }
    }

    #[test]
    fn times_and_dates_round_trip() {
        let conn = open_memory_database().unwrap();
        let med_id = seed_medication(&conn);
        let s = schedule(med_id, &["08:00", "20:00"]);
        insert_schedule(&conn, &s).unwrap();

        let loaded = list_schedules_for_medication(&conn, &med_id).unwrap();
        assert_eq!(loaded, vec![s]);
    }

    #[test]
    fn malformed_times_are_stored_verbatim() {
        let conn = open_memory_database().unwrap();
        let med_id = seed_medication(&conn);
        insert_schedule(&conn, &schedule(med_id, &["8am", "09:00"])).unwrap();

        let loaded = list_active_schedules(&conn).unwrap();
        assert_eq!(loaded[0].times, vec!["8am", "09:00"]);
    }

    #[test]
    fn inactive_schedules_are_not_listed() {
        let conn = open_memory_database().unwrap();
        let med_id = seed_medication(&conn);
        let s = MedicationSchedule {
            is_active: false,
            ..schedule(med_id, &["08:00"])
        };
        insert_schedule(&conn, &s).unwrap();

        assert!(list_active_schedules(&conn).unwrap().is_empty());
        assert_eq!(list_schedules_for_medication(&conn, &med_id).unwrap().len(), 1);
    }

    #[test]
    fn schedule_requires_existing_medication() {
        let conn = open_memory_database().unwrap();
        let err = insert_schedule(&conn, &schedule(Uuid::new_v4(), &["08:00"])).unwrap_err();
        assert!(matches!(err, DatabaseError::Sqlite(_)));
    }
}
