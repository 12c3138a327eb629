//! Key/value settings: the reconciliation run marker and alarm preferences.

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use super::{format_datetime, parse_datetime};
use crate::db::DatabaseError;
use crate::models::AlarmSettings;

const RUN_MARKER_KEY: &str = "reconciliation.last_run";
const ALARM_SETTINGS_KEY: &str = "alarms.settings";

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>, DatabaseError> {
    let value = conn
        .query_row(
            "SELECT value FROM app_settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO app_settings (key, value) VALUES (?1, ?2)
         ON CONFLICT (key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub fn delete_setting(conn: &Connection, key: &str) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM app_settings WHERE key = ?1", params![key])?;
    Ok(())
}

pub fn get_run_marker(conn: &Connection) -> Result<Option<NaiveDateTime>, DatabaseError> {
    get_setting(conn, RUN_MARKER_KEY)?
        .map(|raw| parse_datetime(RUN_MARKER_KEY, &raw))
        .transpose()
}

pub fn set_run_marker(conn: &Connection, at: NaiveDateTime) -> Result<(), DatabaseError> {
    set_setting(conn, RUN_MARKER_KEY, &format_datetime(at))
}

pub fn clear_run_marker(conn: &Connection) -> Result<(), DatabaseError> {
    delete_setting(conn, RUN_MARKER_KEY)
}

/// Stored preferences, defaults when never written.
pub fn get_alarm_settings(conn: &Connection) -> Result<AlarmSettings, DatabaseError> {
    match get_setting(conn, ALARM_SETTINGS_KEY)? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(AlarmSettings::default()),
    }
}

pub fn set_alarm_settings(conn: &Connection, settings: &AlarmSettings) -> Result<(), DatabaseError> {
    set_setting(conn, ALARM_SETTINGS_KEY, &serde_json::to_string(settings)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::NaiveDate;

    #[test]
    fn run_marker_absent_until_written() {
        let conn = open_memory_database().unwrap();
        assert!(get_run_marker(&conn).unwrap().is_none());

        let at = NaiveDate::from_ymd_opt(2025, 5, 4).unwrap().and_hms_opt(8, 0, 12).unwrap();
        set_run_marker(&conn, at).unwrap();
        assert_eq!(get_run_marker(&conn).unwrap(), Some(at));

        clear_run_marker(&conn).unwrap();
        assert!(get_run_marker(&conn).unwrap().is_none());
    }

    #[test]
    fn corrupt_marker_is_reported() {
        let conn = open_memory_database().unwrap();
        set_setting(&conn, RUN_MARKER_KEY, "yesterday-ish").unwrap();
        assert!(matches!(
            get_run_marker(&conn),
            Err(DatabaseError::InvalidValue { .. })
        ));
    }

    #[test]
    fn alarm_settings_default_then_persist() {
        let conn = open_memory_database().unwrap();
        assert_eq!(get_alarm_settings(&conn).unwrap(), AlarmSettings::default());

        let off = AlarmSettings {
            alarms_enabled: false,
            vibration_enabled: true,
        };
        set_alarm_settings(&conn, &off).unwrap();
        assert_eq!(get_alarm_settings(&conn).unwrap(), off);
    }
}
