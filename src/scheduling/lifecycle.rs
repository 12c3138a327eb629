//! Removing a medication from the reminder system.
//!
//! Its alarms are cancelled before the rows go, then the queue is re-read and
//! anything still carrying the medication id is cancelled individually. A
//! pass that listed the queue before the delete could otherwise leave an
//! orphaned alarm behind.

use serde::Serialize;
use uuid::Uuid;

use super::error::SchedulingError;
use super::store::MedicationStore;
use crate::models::{is_medicine_data, NotificationRecord};
use crate::notifications::{NotificationCenter, NotificationError};

/// Alarm cancellation for one medication, both phases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSweep {
    pub cancelled: usize,
    /// Found on the verification pass and cancelled then.
    pub stragglers_cancelled: usize,
    /// Still present after the verification pass.
    pub stragglers_remaining: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionReport {
    pub medication_id: Uuid,
    #[serde(flatten)]
    pub notifications: NotificationSweep,
    pub schedules_removed: usize,
    pub logs_removed: usize,
}

pub fn delete_medication<S, N>(store: &S, center: &mut N, id: Uuid) -> Result<DeletionReport, SchedulingError>
where
    S: MedicationStore + ?Sized,
    N: NotificationCenter + ?Sized,
{
    let cancelled = cancel_for_medication(center, id);
    let counts = store.delete_medication_cascade(&id)?;
    let notifications = verify_cleared(center, id, cancelled);

    tracing::info!(
        medication_id = %id,
        cancelled = notifications.cancelled,
        stragglers = notifications.stragglers_cancelled,
        schedules = counts.schedules,
        logs = counts.logs,
        "Medication deleted"
    );

    Ok(DeletionReport {
        medication_id: id,
        notifications,
        schedules_removed: counts.schedules,
        logs_removed: counts.logs,
    })
}

/// Stop reminding about a medication while keeping its history.
pub fn deactivate_medication<S, N>(store: &S, center: &mut N, id: Uuid) -> Result<NotificationSweep, SchedulingError>
where
    S: MedicationStore + ?Sized,
    N: NotificationCenter + ?Sized,
{
    store.set_medication_active(&id, false)?;
    let cancelled = cancel_for_medication(center, id);
    let sweep = verify_cleared(center, id, cancelled);
    tracing::info!(medication_id = %id, cancelled = sweep.cancelled, "Medication deactivated");
    Ok(sweep)
}

fn belongs_to(record: &NotificationRecord, id: Uuid) -> bool {
    is_medicine_data(&record.data)
        && record
            .data
            .get("medicationId")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            == Some(id)
}

fn matching<N: NotificationCenter + ?Sized>(center: &N, id: Uuid) -> Option<Vec<NotificationRecord>> {
    match center.list_scheduled() {
        Ok(records) => Some(records.into_iter().filter(|r| belongs_to(r, id)).collect()),
        Err(e) => {
            tracing::warn!(medication_id = %id, error = %e, "Could not list notifications");
            None
        }
    }
}

fn cancel_for_medication<N: NotificationCenter + ?Sized>(center: &mut N, id: Uuid) -> usize {
    let mut cancelled = 0;
    for record in matching(center, id).unwrap_or_default() {
        match center.cancel(&record.id) {
            Ok(()) | Err(NotificationError::NotFound(_)) => cancelled += 1,
            Err(e) => tracing::warn!(id = %record.id, medication_id = %id, error = %e, "Cancel failed"),
        }
    }
    cancelled
}

fn verify_cleared<N: NotificationCenter + ?Sized>(center: &mut N, id: Uuid, cancelled: usize) -> NotificationSweep {
    let mut sweep = NotificationSweep {
        cancelled,
        ..NotificationSweep::default()
    };
    let Some(stragglers) = matching(center, id) else {
        return sweep;
    };

    for record in stragglers {
        match center.cancel(&record.id) {
            Ok(()) | Err(NotificationError::NotFound(_)) => sweep.stragglers_cancelled += 1,
            Err(e) => {
                sweep.stragglers_remaining += 1;
                tracing::warn!(id = %record.id, medication_id = %id, error = %e, "Straggler cancel failed");
            }
        }
    }
    if sweep.stragglers_cancelled > 0 {
        tracing::warn!(medication_id = %id, count = sweep.stragglers_cancelled, "Cancelled straggling alarms");
    }
    sweep
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseError;
    use crate::models::enums::{DoseOutcome, DoseStatus};
    use crate::models::{DoseKey, DoseLog, Medication, MedicationSchedule, NotificationPayload, ScheduledDose, TimeOfDay};
    use crate::notifications::InMemoryNotificationCenter;
    use crate::scheduling::store::{DoseLogStore, SqliteReminderStore};
    use chrono::NaiveDate;
    use serde_json::json;

    fn seed(store: &SqliteReminderStore, name: &str) -> Medication {
        let created = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(8, 0, 0).unwrap();
        let med = Medication {
            id: Uuid::new_v4(),
            name: name.into(),
            dosage: "1".into(),
            unit: "tablet".into(),
            is_active: true,
            created_at: created,
        };
        store.add_medication(&med).unwrap();
        store
            .add_schedule(&MedicationSchedule {
                id: Uuid::new_v4(),
                medication_id: med.id,
                times: vec!["09:00".into(), "21:00".into()],
                is_active: true,
                start_date: None,
                end_date: None,
                created_at: created,
            })
            .unwrap();
        let key = DoseKey::new(med.id, TimeOfDay::new(9, 0).unwrap());
        store
            .write_log(&DoseLog::new(key, created.date(), DoseOutcome::Taken, created))
            .unwrap();
        med
    }

    fn alarm(center: &mut InMemoryNotificationCenter, med: &Medication, h: u32) {
        let dose = ScheduledDose {
            key: DoseKey::new(med.id, TimeOfDay::new(h, 0).unwrap()),
            medication_name: med.name.clone(),
            dosage: med.dosage.clone(),
            unit: med.unit.clone(),
            status: DoseStatus::Pending,
        };
        center
            .schedule_after(600, &NotificationPayload::for_dose(&dose, true))
            .unwrap();
    }

    #[test]
    fn delete_leaves_nothing_referencing_the_medication() {
        let store = SqliteReminderStore::in_memory().unwrap();
        let mut center = InMemoryNotificationCenter::new();
        let gone = seed(&store, "Gone");
        let kept = seed(&store, "Kept");
        alarm(&mut center, &gone, 9);
        alarm(&mut center, &gone, 21);
        alarm(&mut center, &kept, 9);
        center.insert_raw(60, json!({"type": "water", "medicationId": gone.id}));

        let report = delete_medication(&store, &mut center, gone.id).unwrap();
        assert_eq!(report.notifications.cancelled, 2);
        assert_eq!(report.schedules_removed, 1);
        assert_eq!(report.logs_removed, 1);

        assert!(store.medication(&gone.id).unwrap().is_none());
        assert!(store.schedules_for(&gone.id).unwrap().is_empty());
        assert_eq!(store.log_count_for(&gone.id).unwrap(), 0);
        assert!(store.medication(&kept.id).unwrap().is_some());

        let left = center.list_scheduled().unwrap();
        assert_eq!(left.len(), 2);
        assert!(left.iter().all(|r| !belongs_to(r, gone.id)));
    }

    #[test]
    fn stragglers_are_force_cancelled() {
        let store = SqliteReminderStore::in_memory().unwrap();
        let mut center = InMemoryNotificationCenter::new();
        let med = seed(&store, "Racy");
        alarm(&mut center, &med, 9);
        alarm(&mut center, &med, 21);
        center.lag_next_cancels(1);

        let report = delete_medication(&store, &mut center, med.id).unwrap();
        assert_eq!(report.notifications.stragglers_cancelled, 1);
        assert_eq!(report.notifications.stragglers_remaining, 0);
        assert!(center.is_empty());
    }

    #[test]
    fn malformed_medicine_metadata_with_matching_id_is_cancelled() {
        let store = SqliteReminderStore::in_memory().unwrap();
        let mut center = InMemoryNotificationCenter::new();
        let med = seed(&store, "Legacy");
        center.insert_raw(60, json!({"type": "medicine", "medicationId": med.id, "time": "bogus"}));

        let report = delete_medication(&store, &mut center, med.id).unwrap();
        assert_eq!(report.notifications.cancelled, 1);
        assert!(center.is_empty());
    }

    #[test]
    fn unknown_medication_is_not_found_after_cancelling() {
        let store = SqliteReminderStore::in_memory().unwrap();
        let mut center = InMemoryNotificationCenter::new();
        let ghost = Medication {
            id: Uuid::new_v4(),
            name: "Ghost".into(),
            dosage: "1".into(),
            unit: "mg".into(),
            is_active: true,
            created_at: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(8, 0, 0).unwrap(),
        };
        alarm(&mut center, &ghost, 9);

        let err = delete_medication(&store, &mut center, ghost.id).unwrap_err();
        assert!(matches!(err, SchedulingError::Database(DatabaseError::NotFound { .. })));
        assert!(center.is_empty());
    }

    #[test]
    fn deactivate_keeps_history_and_clears_alarms() {
        let store = SqliteReminderStore::in_memory().unwrap();
        let mut center = InMemoryNotificationCenter::new();
        let med = seed(&store, "Paused");
        alarm(&mut center, &med, 21);

        let sweep = deactivate_medication(&store, &mut center, med.id).unwrap();
        assert_eq!(sweep.cancelled, 1);
        assert!(center.is_empty());

        let stored = store.medication(&med.id).unwrap().unwrap();
        assert!(!stored.is_active);
        assert_eq!(store.log_count_for(&med.id).unwrap(), 1);
        assert!(store.list_active_medications().unwrap().is_empty());
    }

    #[test]
    fn list_failure_does_not_block_deletion() {
        let store = SqliteReminderStore::in_memory().unwrap();
        let mut center = InMemoryNotificationCenter::new();
        let med = seed(&store, "Offline");
        alarm(&mut center, &med, 9);
        center.fail_next_lists(1);

        let report = delete_medication(&store, &mut center, med.id).unwrap();
        assert_eq!(report.notifications.cancelled, 0);
        assert_eq!(report.notifications.stragglers_cancelled, 1);
        assert!(center.is_empty());
    }
}
