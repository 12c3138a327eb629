use thiserror::Error;

use crate::db::DatabaseError;
use crate::models::DoseParseError;
use crate::notifications::NotificationError;

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Parse error: {0}")]
    Parse(#[from] DoseParseError),

    #[error("No dose {0} scheduled today")]
    UnknownDose(String),

    #[error("Reminder engine is not running")]
    EngineStopped,
}
