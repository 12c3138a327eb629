use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::Medication;

/// Rows removed by `delete_medication_cascade`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeCounts {
    pub schedules: usize,
    pub logs: usize,
}

pub fn insert_medication(conn: &Connection, med: &Medication) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medications (id, name, dosage, unit, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            med.id.to_string(),
            med.name,
            med.dosage,
            med.unit,
            med.is_active as i32,
            format_datetime(med.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_medication(conn: &Connection, id: &Uuid) -> Result<Option<Medication>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, name, dosage, unit, is_active, created_at
             FROM medications WHERE id = ?1",
            params![id.to_string()],
            medication_row_from_rusqlite,
        )
        .optional()?;

    row.map(medication_from_row).transpose()
}

/// Active medications in creation order.
pub fn list_active_medications(conn: &Connection) -> Result<Vec<Medication>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, dosage, unit, is_active, created_at
         FROM medications WHERE is_active = 1
         ORDER BY created_at ASC, rowid ASC",
    )?;

    let rows = stmt.query_map([], medication_row_from_rusqlite)?;

    let mut meds = Vec::new();
    for row in rows {
        meds.push(medication_from_row(row?)?);
    }
    Ok(meds)
}

pub fn set_medication_active(conn: &Connection, id: &Uuid, active: bool) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE medications SET is_active = ?1 WHERE id = ?2",
        params![active as i32, id.to_string()],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Medication".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Delete logs, schedules, then the medication itself, atomically.
pub fn delete_medication_cascade(conn: &Connection, id: &Uuid) -> Result<CascadeCounts, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let id_text = id.to_string();

    let logs = tx.execute("DELETE FROM dose_logs WHERE medication_id = ?1", params![id_text])?;
    let schedules = tx.execute(
        "DELETE FROM medication_schedules WHERE medication_id = ?1",
        params![id_text],
    )?;
    let meds = tx.execute("DELETE FROM medications WHERE id = ?1", params![id_text])?;

    if meds == 0 {
        // Dropping `tx` rolls back.
        return Err(DatabaseError::NotFound {
            entity_type: "Medication".into(),
            id: id_text,
        });
    }

    tx.commit()?;
    Ok(CascadeCounts { schedules, logs })
}

struct MedicationRow {
    id: String,
    name: String,
    dosage: String,
    unit: String,
    is_active: i32,
    created_at: String,
}

fn medication_row_from_rusqlite(row: &Row<'_>) -> rusqlite::Result<MedicationRow> {
    Ok(MedicationRow {
        id: row.get(0)?,
        name: row.get(1)?,
        dosage: row.get(2)?,
        unit: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn medication_from_row(row: MedicationRow) -> Result<Medication, DatabaseError> {
    Ok(Medication {
        id: parse_uuid("medications.id", &row.id)?,
        name: row.name,
        dosage: row.dosage,
        unit: row.unit,
        is_active: row.is_active != 0,
        created_at: parse_datetime("medications.created_at", &row.created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::NaiveDateTime;

    fn med(name: &str, created: &str, active: bool) -> Medication {
        Medication {
            id: Uuid::new_v4(),
            name: name.into(),
            dosage: "10".into(),
            unit: "mg".into(),
            is_active: active,
            created_at: NaiveDateTime::parse_from_str(created, "%Y-%m-%d %H:%M:%S").unwrap(),
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let conn = open_memory_database().unwrap();
        let m = med("Lisinopril", "2025-01-01 08:00:00", true);
        insert_medication(&conn, &m).unwrap();
        assert_eq!(get_medication(&conn, &m.id).unwrap(), Some(m));
    }

    #[test]
    fn get_missing_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_medication(&conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn active_list_is_creation_ordered_and_filtered() {
        let conn = open_memory_database().unwrap();
        let late = med("Late", "2025-01-02 08:00:00", true);
        let early = med("Early", "2025-01-01 08:00:00", true);
        let off = med("Off", "2025-01-01 07:00:00", false);
        for m in [&late, &early, &off] {
            insert_medication(&conn, m).unwrap();
        }

        let names: Vec<String> = list_active_medications(&conn)
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["Early", "Late"]);
    }

    #[test]
    fn deactivate_unknown_medication_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = set_medication_active(&conn, &Uuid::new_v4(), false).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn cascade_of_unknown_medication_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = delete_medication_cascade(&conn, &Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
