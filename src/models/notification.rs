//! Platform notification records and the typed payload this engine attaches.
//!
//! The OS hands back notifications as an identifier plus free-form JSON.
//! Everything medicine-related is validated into `NotificationPayload` here,
//! at the boundary, and nowhere else.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::dose::{DoseKey, ScheduledDose, TimeOfDay};
use crate::notifications::NotificationError;

/// Value of the `type` metadata field owned by this engine.
pub const MEDICINE_NOTIFICATION_TYPE: &str = "medicine";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub String);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NotificationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for NotificationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A notification currently scheduled on the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub data: Value,
}

impl NotificationRecord {
    /// Tagged `type = "medicine"`, whether or not the rest of the metadata is valid.
    pub fn is_medicine(&self) -> bool {
        is_medicine_data(&self.data)
    }

    /// Validated medicine payload, `None` for other types or malformed metadata.
    pub fn medicine_payload(&self) -> Option<NotificationPayload> {
        NotificationPayload::from_data(&self.data).ok()
    }
}

pub fn is_medicine_data(data: &Value) -> bool {
    data.get("type").and_then(Value::as_str) == Some(MEDICINE_NOTIFICATION_TYPE)
}

/// Metadata attached to every dose alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub medication_id: Uuid,
    pub time: TimeOfDay,
    pub dose_key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub vibrate: bool,
}

impl NotificationPayload {
    pub fn for_dose(dose: &ScheduledDose, vibrate: bool) -> Self {
        let body = format!("{} {}", dose.dosage, dose.unit).trim().to_string();
        Self {
            kind: MEDICINE_NOTIFICATION_TYPE.to_string(),
            medication_id: dose.key.medication_id,
            time: dose.key.time,
            dose_key: dose.key.to_string(),
            title: format!("Time for {}", dose.medication_name),
            body,
            vibrate,
        }
    }

    /// Validate raw platform metadata.
    ///
    /// `medicationId` and `time` are authoritative; a `doseKey` that disagrees
    /// with them is rejected rather than guessed at.
    pub fn from_data(data: &Value) -> Result<Self, NotificationError> {
        if !is_medicine_data(data) {
            return Err(NotificationError::InvalidPayload(
                "not a medicine notification".into(),
            ));
        }

        let payload: Self = serde_json::from_value(data.clone())
            .map_err(|e| NotificationError::InvalidPayload(e.to_string()))?;

        let expected = payload.key().to_string();
        if payload.dose_key != expected {
            return Err(NotificationError::InvalidPayload(format!(
                "doseKey {} does not match {expected}",
                payload.dose_key
            )));
        }

        Ok(payload)
    }

    pub fn to_data(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn key(&self) -> DoseKey {
        DoseKey::new(self.medication_id, self.time)
    }
}
