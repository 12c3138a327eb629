//! Bring the OS notification queue in line with today's pending doses.
//!
//! A pass is cancel-all-then-create: every medicine notification found on the
//! device is cancelled, then one alarm is created per pending, schedulable
//! DoseKey. Notifications of other types are never touched.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::models::{AlarmSettings, DoseKey, NotificationId, NotificationPayload, NotificationRecord, ScheduledDose};
use crate::notifications::{NotificationCenter, NotificationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedNotification {
    pub key: DoseKey,
    pub fire_in_secs: u32,
    pub payload: NotificationPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    /// Same DoseKey already planned in this pass.
    Duplicate,
    /// Due time already passed today.
    Missed,
    /// More than the maximum lead ahead.
    TooFar,
    /// Inside the debounce window.
    TooSoon,
    AlarmsDisabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscardedDose {
    pub key: DoseKey,
    pub seconds_until_fire: i64,
    pub reason: DiscardReason,
}

/// A medicine notification slated for cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelTarget {
    pub id: NotificationId,
    /// `None` when the metadata is tagged medicine but malformed.
    pub key: Option<DoseKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub to_cancel: Vec<CancelTarget>,
    pub to_create: Vec<PlannedNotification>,
    pub discarded: Vec<DiscardedDose>,
    /// Valid medicine keys on the queue before the pass.
    pub existing_keys: BTreeSet<DoseKey>,
    /// Non-medicine notifications left alone.
    pub untouched: usize,
}

impl ReconciliationPlan {
    pub fn has_desired(&self) -> bool {
        !self.to_create.is_empty()
    }
}

/// Outcome of an applied pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub cancelled: usize,
    pub created: usize,
    pub cancel_failures: usize,
    pub create_failures: usize,
    pub discarded: Vec<DiscardedDose>,
    /// Keys scheduled now that were not before the pass.
    pub added: Vec<DoseKey>,
    /// Keys scheduled before the pass that are no longer.
    pub removed: Vec<DoseKey>,
    pub ran_at: NaiveDateTime,
}

impl ReconciliationReport {
    /// The set of scheduled keys did not change.
    pub fn is_net_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        self.cancel_failures > 0 || self.create_failures > 0
    }
}

/// Decide what to cancel and what to create. Pure.
pub fn plan(
    desired: &[ScheduledDose],
    existing: &[NotificationRecord],
    now: NaiveDateTime,
    settings: &AlarmSettings,
    config: &EngineConfig,
) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::default();

    for record in existing {
        if !record.is_medicine() {
            plan.untouched += 1;
            continue;
        }
        let key = record.medicine_payload().map(|p| p.key());
        if let Some(key) = key {
            plan.existing_keys.insert(key);
        }
        plan.to_cancel.push(CancelTarget {
            id: record.id.clone(),
            key,
        });
    }

    let today = now.date();
    let mut seen: BTreeSet<DoseKey> = BTreeSet::new();

    for dose in desired.iter().filter(|d| d.is_pending()) {
        let seconds_until_fire = (dose.due_at(today) - now).num_seconds();
        let discard = |reason| DiscardedDose {
            key: dose.key,
            seconds_until_fire,
            reason,
        };

        if !seen.insert(dose.key) {
            plan.discarded.push(discard(DiscardReason::Duplicate));
            continue;
        }
        if !settings.alarms_enabled {
            plan.discarded.push(discard(DiscardReason::AlarmsDisabled));
            continue;
        }
        if seconds_until_fire <= 0 {
            plan.discarded.push(discard(DiscardReason::Missed));
            continue;
        }
        if seconds_until_fire > config.max_lead_secs {
            plan.discarded.push(discard(DiscardReason::TooFar));
            continue;
        }
        if seconds_until_fire < config.min_lead_secs {
            plan.discarded.push(discard(DiscardReason::TooSoon));
            continue;
        }

        plan.to_create.push(PlannedNotification {
            key: dose.key,
            fire_in_secs: u32::try_from(seconds_until_fire.max(1)).unwrap_or(u32::MAX),
            payload: NotificationPayload::for_dose(dose, settings.vibration_enabled),
        });
    }

    plan
}

/// Execute a plan: every cancel, then every create.
///
/// Per-item platform failures are logged and counted; the pass carries on.
pub fn apply<N: NotificationCenter + ?Sized>(
    center: &mut N,
    plan: &ReconciliationPlan,
    now: NaiveDateTime,
) -> ReconciliationReport {
    let mut cancelled = 0;
    let mut cancel_failures = 0;
    let mut still_scheduled: BTreeSet<DoseKey> = BTreeSet::new();

    for target in &plan.to_cancel {
        match center.cancel(&target.id) {
            Ok(()) => cancelled += 1,
            Err(NotificationError::NotFound(_)) => {
                tracing::debug!(id = %target.id, "Notification already gone");
            }
            Err(e) => {
                cancel_failures += 1;
                if let Some(key) = target.key {
                    still_scheduled.insert(key);
                }
                tracing::warn!(id = %target.id, error = %e, "Failed to cancel medicine notification");
            }
        }
    }

    let mut created = 0;
    let mut create_failures = 0;
    for planned in &plan.to_create {
        match center.schedule_after(planned.fire_in_secs, &planned.payload) {
            Ok(id) => {
                created += 1;
                still_scheduled.insert(planned.key);
                tracing::debug!(id = %id, key = %planned.key, in_secs = planned.fire_in_secs, "Scheduled dose alarm");
            }
            Err(e) => {
                create_failures += 1;
                tracing::warn!(key = %planned.key, error = %e, "Failed to schedule dose alarm");
            }
        }
    }

    let added = still_scheduled.difference(&plan.existing_keys).copied().collect();
    let removed = plan.existing_keys.difference(&still_scheduled).copied().collect();

    ReconciliationReport {
        cancelled,
        created,
        cancel_failures,
        create_failures,
        discarded: plan.discarded.clone(),
        added,
        removed,
        ran_at: now,
    }
}

/// List, plan and apply in one go.
pub fn reconcile<N: NotificationCenter + ?Sized>(
    center: &mut N,
    desired: &[ScheduledDose],
    now: NaiveDateTime,
    settings: &AlarmSettings,
    config: &EngineConfig,
) -> Result<ReconciliationReport, NotificationError> {
    let existing = center.list_scheduled()?;
    let plan = plan(desired, &existing, now, settings, config);
    Ok(apply(center, &plan, now))
}
