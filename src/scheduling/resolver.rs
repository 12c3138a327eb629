//! Today's doses from medications, schedules and dose logs.
//!
//! Pure: no I/O, no clock. Malformed schedule times are skipped with a
//! warning and never abort resolution.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::models::enums::{DoseOutcome, DoseStatus};
use crate::models::{DoseKey, DoseLog, Medication, MedicationSchedule, ScheduledDose, TimeOfDay};

/// Resolve the doses due on `now`'s date.
///
/// Ordered by time of day, ties broken by medication creation order. The
/// same `(medication, time)` listed twice yields two entries; deduplication
/// happens when notifications are planned.
pub fn resolve_today(
    medications: &[Medication],
    schedules: &[MedicationSchedule],
    logs: &[DoseLog],
    now: NaiveDateTime,
) -> Vec<ScheduledDose> {
    let today = now.date();

    let mut active: Vec<(usize, &Medication)> = medications
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_active)
        .collect();
    active.sort_by(|(ia, a), (ib, b)| a.created_at.cmp(&b.created_at).then(ia.cmp(ib)));
    let by_id: HashMap<Uuid, (usize, &Medication)> = active
        .into_iter()
        .enumerate()
        .map(|(rank, (_, med))| (med.id, (rank, med)))
        .collect();

    let outcomes = outcomes_for(logs, today);

    let mut doses: Vec<(usize, ScheduledDose)> = Vec::new();
    for schedule in schedules {
        if !schedule.is_active || !schedule.covers(today) {
            continue;
        }
        let Some(&(rank, med)) = by_id.get(&schedule.medication_id) else {
            continue;
        };

        for raw in &schedule.times {
            let time = match TimeOfDay::parse(raw) {
                Ok(time) => time,
                Err(e) => {
                    tracing::warn!(
                        medication_id = %med.id,
                        schedule_id = %schedule.id,
                        error = %e,
                        "Skipping malformed dose time"
                    );
                    continue;
                }
            };

            let key = DoseKey::new(med.id, time);
            let status = outcomes
                .get(&key)
                .map(|outcome| DoseStatus::from(*outcome))
                .unwrap_or(DoseStatus::Pending);

            doses.push((
                rank,
                ScheduledDose {
                    key,
                    medication_name: med.name.clone(),
                    dosage: med.dosage.clone(),
                    unit: med.unit.clone(),
                    status,
                },
            ));
        }
    }

    doses.sort_by(|(ra, a), (rb, b)| a.key.time.cmp(&b.key.time).then(ra.cmp(rb)));
    doses.into_iter().map(|(_, dose)| dose).collect()
}

/// Latest outcome per key for `date`.
fn outcomes_for(logs: &[DoseLog], date: chrono::NaiveDate) -> HashMap<DoseKey, DoseOutcome> {
    let mut latest: HashMap<DoseKey, &DoseLog> = HashMap::new();
    for log in logs.iter().filter(|l| l.date == date) {
        latest
            .entry(log.key())
            .and_modify(|current| {
                if log.recorded_at >= current.recorded_at {
                    *current = log;
                }
            })
            .or_insert(log);
    }
    latest.into_iter().map(|(key, log)| (key, log.outcome)).collect()
}
