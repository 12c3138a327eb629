//! The device's local-notification primitive, as seen by the engine.
//!
//! Platform shells implement `NotificationCenter`; delivery callbacks are
//! turned into `NotificationEvent`s and pushed onto the reminder service
//! channel instead of calling back into the engine directly.

mod memory;

pub use memory::{InMemoryNotificationCenter, ScheduledNotification};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{NotificationId, NotificationPayload, NotificationRecord};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("Notification platform error: {0}")]
    Platform(String),

    #[error("Notification not found: {0}")]
    NotFound(NotificationId),

    #[error("Invalid notification payload: {0}")]
    InvalidPayload(String),
}

/// Local notification scheduling primitive.
pub trait NotificationCenter: Send {
    /// Everything currently scheduled, of every type, in no particular order.
    fn list_scheduled(&self) -> Result<Vec<NotificationRecord>, NotificationError>;

    fn cancel(&mut self, id: &NotificationId) -> Result<(), NotificationError>;

    /// Schedule a one-shot alarm `seconds` from now.
    fn schedule_after(
        &mut self,
        seconds: u32,
        payload: &NotificationPayload,
    ) -> Result<NotificationId, NotificationError>;
}

/// Action buttons offered on a dose alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationAction {
    MarkTaken,
    Skip,
}

/// Push-style callback from the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// An alarm fired.
    Delivered { id: NotificationId, data: Value },
    /// The user pressed an action button on an alarm.
    Action {
        id: NotificationId,
        data: Value,
        action: NotificationAction,
    },
}

impl NotificationEvent {
    pub fn id(&self) -> &NotificationId {
        match self {
            Self::Delivered { id, .. } | Self::Action { id, .. } => id,
        }
    }

    pub fn data(&self) -> &Value {
        match self {
            Self::Delivered { data, .. } | Self::Action { data, .. } => data,
        }
    }
}
