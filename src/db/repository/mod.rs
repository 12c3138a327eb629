//! Repository layer: entity-scoped database operations.

mod dose_log;
mod medication;
mod schedule;
mod settings;

use chrono::{NaiveDate, NaiveDateTime};

use super::DatabaseError;

pub use dose_log::*;
pub use medication::*;
pub use schedule::*;
pub use settings::*;

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn format_datetime(at: NaiveDateTime) -> String {
    at.format(DATETIME_FORMAT).to_string()
}

pub(crate) fn parse_date(field: &str, value: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| DatabaseError::InvalidValue {
        field: field.into(),
        value: value.into(),
    })
}

pub(crate) fn parse_datetime(field: &str, value: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT).map_err(|_| DatabaseError::InvalidValue {
        field: field.into(),
        value: value.into(),
    })
}

pub(crate) fn parse_uuid(field: &str, value: &str) -> Result<uuid::Uuid, DatabaseError> {
    uuid::Uuid::parse_str(value).map_err(|_| DatabaseError::InvalidValue {
        field: field.into(),
        value: value.into(),
    })
}
