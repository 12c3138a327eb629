//! Recording taken/skipped doses against today's snapshot.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::error::SchedulingError;
use super::store::DoseLogStore;
use crate::models::enums::{DoseOutcome, DoseStatus};
use crate::models::{DoseKey, DoseLog, ScheduledDose};
use crate::notifications::NotificationCenter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkOutcome {
    pub dose: ScheduledDose,
    pub notifications_cancelled: usize,
}

/// Set the outcome of one of today's doses.
///
/// The snapshot is updated first and reverted if the log write fails. A
/// taken dose also loses its pending alarm; cancellation problems are only
/// logged.
pub fn mark_dose<S, N>(
    store: &S,
    center: &mut N,
    snapshot: &mut [ScheduledDose],
    key: DoseKey,
    outcome: DoseOutcome,
    now: NaiveDateTime,
) -> Result<MarkOutcome, SchedulingError>
where
    S: DoseLogStore + ?Sized,
    N: NotificationCenter + ?Sized,
{
    let previous: Vec<(usize, DoseStatus)> = snapshot
        .iter()
        .enumerate()
        .filter(|(_, d)| d.key == key)
        .map(|(i, d)| (i, d.status))
        .collect();
    let Some(&(first, _)) = previous.first() else {
        return Err(SchedulingError::UnknownDose(key.to_string()));
    };

    for &(i, _) in &previous {
        snapshot[i].status = outcome.into();
    }

    let log = DoseLog::new(key, now.date(), outcome, now);
    if let Err(e) = store.write_log(&log) {
        for &(i, status) in &previous {
            snapshot[i].status = status;
        }
        tracing::warn!(key = %key, error = %e, "Dose log write failed, reverted");
        return Err(e.into());
    }

    let notifications_cancelled = match outcome {
        DoseOutcome::Taken => cancel_for_key(center, key),
        DoseOutcome::Skipped => 0,
    };

    tracing::info!(key = %key, outcome = %outcome, notifications_cancelled, "Dose marked");
    Ok(MarkOutcome {
        dose: snapshot[first].clone(),
        notifications_cancelled,
    })
}

/// Cancel the alarms carrying `key`. Returns how many were cancelled.
pub fn cancel_for_key<N: NotificationCenter + ?Sized>(center: &mut N, key: DoseKey) -> usize {
    let records = match center.list_scheduled() {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Could not list notifications for dose");
            return 0;
        }
    };

    let mut cancelled = 0;
    for record in records {
        if record.medicine_payload().map(|p| p.key()) != Some(key) {
            continue;
        }
        match center.cancel(&record.id) {
            Ok(()) => cancelled += 1,
            Err(e) => tracing::warn!(id = %record.id, key = %key, error = %e, "Failed to cancel dose alarm"),
        }
    }
    cancelled
}
