//! The reminder engine: today's snapshot, the reconciliation guard and every
//! operation the UI and the platform shell can invoke.
//!
//! Single-threaded by construction. The async surface lives in `service`,
//! which owns one engine and feeds it commands in order.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use uuid::Uuid;

use super::clock::Clock;
use super::error::SchedulingError;
use super::guard::{self, ReconciliationGuard};
use super::lifecycle::{self, DeletionReport, NotificationSweep};
use super::reconciler::{self, ReconciliationPlan, ReconciliationReport};
use super::resolver::resolve_today;
use super::store::ReminderStore;
use super::tracker::{self, MarkOutcome};
use crate::config::EngineConfig;
use crate::db::DatabaseError;
use crate::models::enums::DoseOutcome;
use crate::models::{is_medicine_data, AlarmSettings, DoseKey, NotificationPayload, ScheduledDose};
use crate::notifications::{NotificationAction, NotificationCenter, NotificationEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A pass is running or has just finished.
    Reconciling,
    UpToDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    Ran(ReconciliationReport),
    Skipped(SkipReason),
}

impl TriggerOutcome {
    pub fn ran(&self) -> bool {
        matches!(self, Self::Ran(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    Reconciling,
    NotMedicine,
    InvalidPayload(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// An alarm fired; the daily pass was re-checked.
    Delivered {
        key: DoseKey,
        reconciliation: TriggerOutcome,
    },
    /// An alarm action recorded a dose outcome.
    Marked(MarkOutcome),
    Ignored(IgnoreReason),
}

struct TodaySnapshot {
    date: NaiveDate,
    doses: Vec<ScheduledDose>,
}

pub struct ReminderEngine<S, N> {
    store: S,
    notifications: N,
    clock: Box<dyn Clock>,
    config: EngineConfig,
    guard: ReconciliationGuard,
    settings: AlarmSettings,
    today: Option<TodaySnapshot>,
}

impl<S, N> ReminderEngine<S, N>
where
    S: ReminderStore,
    N: NotificationCenter,
{
    /// Build an engine, loading the persisted alarm settings.
    pub fn new(
        store: S,
        notifications: N,
        clock: Box<dyn Clock>,
        config: EngineConfig,
    ) -> Result<Self, SchedulingError> {
        let settings = store.alarm_settings()?;
        Ok(Self {
            store,
            notifications,
            clock,
            guard: ReconciliationGuard::new(config.reconcile_cooldown),
            config,
            settings,
            today: None,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifications(&self) -> &N {
        &self.notifications
    }

    pub fn is_reconciling(&self) -> bool {
        self.guard.is_reconciling(self.clock.now())
    }

    /// Today's doses with their current status, resolving them if needed.
    pub fn today_doses(&mut self) -> Result<Vec<ScheduledDose>, SchedulingError> {
        let now = self.clock.now();
        self.ensure_today(now)?;
        Ok(self.today.as_ref().map(|t| t.doses.clone()).unwrap_or_default())
    }

    /// First pending dose still ahead of now.
    pub fn next_pending_dose(&mut self) -> Result<Option<ScheduledDose>, SchedulingError> {
        let now = self.clock.now();
        self.ensure_today(now)?;
        Ok(self.today.as_ref().and_then(|t| {
            t.doses
                .iter()
                .find(|d| d.is_pending() && d.due_at(t.date) > now)
                .cloned()
        }))
    }

    /// Run the daily pass if it has not run today or the queue was wiped.
    pub fn trigger_reconciliation_if_due(&mut self) -> Result<TriggerOutcome, SchedulingError> {
        self.guarded_pass(false)
    }

    /// Run a pass regardless of the run marker.
    pub fn reconcile_now(&mut self) -> Result<TriggerOutcome, SchedulingError> {
        self.guarded_pass(true)
    }

    /// Medications or schedules were edited: forget today's pass and redo it.
    pub fn schedules_changed(&mut self) -> Result<TriggerOutcome, SchedulingError> {
        self.store.clear_run_marker()?;
        self.today = None;
        self.trigger_reconciliation_if_due()
    }

    pub fn mark_dose(&mut self, key: DoseKey, outcome: DoseOutcome) -> Result<MarkOutcome, SchedulingError> {
        let now = self.clock.now();
        self.ensure_today(now)?;
        let Some(today) = self.today.as_mut() else {
            return Err(SchedulingError::UnknownDose(key.to_string()));
        };
        tracker::mark_dose(&self.store, &mut self.notifications, &mut today.doses, key, outcome, now)
    }

    /// `mark_dose` for a key in its `<medication-id>@HH:MM` text form.
    pub fn mark_dose_str(&mut self, key: &str, outcome: DoseOutcome) -> Result<MarkOutcome, SchedulingError> {
        let key: DoseKey = key.parse()?;
        self.mark_dose(key, outcome)
    }

    /// A failed cascade has already cancelled the medication's alarms, so
    /// today's pass is invalidated and the next trigger rebuilds the queue.
    pub fn delete_medication(&mut self, id: Uuid) -> Result<DeletionReport, SchedulingError> {
        match lifecycle::delete_medication(&self.store, &mut self.notifications, id) {
            Ok(report) => {
                self.forget_medication(id);
                Ok(report)
            }
            Err(e) => {
                self.today = None;
                if let Err(clear) = self.store.clear_run_marker() {
                    tracing::warn!(medication_id = %id, error = %clear, "Could not clear run marker");
                }
                Err(e)
            }
        }
    }

    pub fn deactivate_medication(&mut self, id: Uuid) -> Result<NotificationSweep, SchedulingError> {
        let sweep = lifecycle::deactivate_medication(&self.store, &mut self.notifications, id)?;
        self.forget_medication(id);
        Ok(sweep)
    }

    pub fn alarm_settings(&self) -> AlarmSettings {
        self.settings
    }

    /// Persist new alarm preferences and re-reconcile under them.
    pub fn update_alarm_settings(&mut self, settings: AlarmSettings) -> Result<TriggerOutcome, SchedulingError> {
        self.store.set_alarm_settings(&settings)?;
        self.settings = settings;
        tracing::info!(
            alarms_enabled = settings.alarms_enabled,
            vibration_enabled = settings.vibration_enabled,
            "Alarm settings updated"
        );
        self.store.clear_run_marker()?;
        self.trigger_reconciliation_if_due()
    }

    /// Entry point for platform callbacks. Everything is dropped while a pass
    /// is in progress or cooling down.
    pub fn handle_notification(&mut self, event: NotificationEvent) -> Result<EventOutcome, SchedulingError> {
        if self.guard.is_reconciling(self.clock.now()) {
            tracing::debug!(id = %event.id(), "Notification event ignored during reconciliation");
            return Ok(EventOutcome::Ignored(IgnoreReason::Reconciling));
        }
        if !is_medicine_data(event.data()) {
            return Ok(EventOutcome::Ignored(IgnoreReason::NotMedicine));
        }
        let payload = match NotificationPayload::from_data(event.data()) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(id = %event.id(), error = %e, "Ignoring medicine notification with bad metadata");
                return Ok(EventOutcome::Ignored(IgnoreReason::InvalidPayload(e.to_string())));
            }
        };

        match event {
            NotificationEvent::Delivered { .. } => {
                let reconciliation = self.trigger_reconciliation_if_due()?;
                Ok(EventOutcome::Delivered {
                    key: payload.key(),
                    reconciliation,
                })
            }
            NotificationEvent::Action { action, .. } => {
                let outcome = match action {
                    NotificationAction::MarkTaken => DoseOutcome::Taken,
                    NotificationAction::Skip => DoseOutcome::Skipped,
                };
                self.mark_dose(payload.key(), outcome).map(EventOutcome::Marked)
            }
        }
    }

    /// Resolve today's doses unless the snapshot is current.
    fn ensure_today(&mut self, now: NaiveDateTime) -> Result<(), SchedulingError> {
        let date = now.date();
        if self.today.as_ref().is_some_and(|t| t.date == date) {
            return Ok(());
        }

        let medications = self.store.list_active_medications()?;
        let schedules = self.store.list_active_schedules()?;
        let logs = self.store.logs_for_date(date)?;
        let doses = resolve_today(&medications, &schedules, &logs, now);
        tracing::debug!(%date, doses = doses.len(), "Resolved today's doses");

        self.today = Some(TodaySnapshot { date, doses });
        Ok(())
    }

    fn plan_pass(&mut self, now: NaiveDateTime) -> Result<ReconciliationPlan, SchedulingError> {
        self.ensure_today(now)?;
        let existing = self.notifications.list_scheduled()?;
        let desired = self.today.as_ref().map(|t| t.doses.as_slice()).unwrap_or_default();
        Ok(reconciler::plan(desired, &existing, now, &self.settings, &self.config))
    }

    /// The guard is held from the first queue listing on. A pass that
    /// applied changes leaves the cooldown behind; a skipped or failed one
    /// releases the guard immediately.
    fn guarded_pass(&mut self, force: bool) -> Result<TriggerOutcome, SchedulingError> {
        let now = self.clock.now();
        if !self.guard.begin(now) {
            tracing::debug!("Reconciliation trigger dropped, pass in progress");
            return Ok(TriggerOutcome::Skipped(SkipReason::Reconciling));
        }
        let result = self.pass(now, force);
        self.guard.abandon();
        result
    }

    fn pass(&mut self, now: NaiveDateTime, force: bool) -> Result<TriggerOutcome, SchedulingError> {
        let marker = if force { None } else { self.run_marker()? };
        let plan = self.plan_pass(now)?;
        if !force {
            let decision = guard::should_run(marker, now, plan.to_cancel.len(), plan.has_desired());
            if !decision.should_run() {
                tracing::debug!(last_run = ?marker, "Reconciliation up to date");
                return Ok(TriggerOutcome::Skipped(SkipReason::UpToDate));
            }
            tracing::info!(?decision, "Reconciliation due");
        }

        let report = reconciler::apply(&mut self.notifications, &plan, now);
        let marked = self.store.set_run_marker(now);
        self.guard.finish(self.clock.now());
        marked?;

        tracing::info!(
            cancelled = report.cancelled,
            created = report.created,
            discarded = report.discarded.len(),
            added = report.added.len(),
            removed = report.removed.len(),
            failures = report.cancel_failures + report.create_failures,
            "Reconciliation pass complete"
        );
        Ok(TriggerOutcome::Ran(report))
    }

    /// Last completed pass. An unreadable marker counts as absent and is
    /// overwritten when the pass completes.
    fn run_marker(&self) -> Result<Option<NaiveDateTime>, SchedulingError> {
        match self.store.run_marker() {
            Ok(marker) => Ok(marker),
            Err(DatabaseError::InvalidValue { field, value }) => {
                tracing::warn!(%field, %value, "Ignoring unreadable run marker");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn forget_medication(&mut self, id: Uuid) {
        if let Some(today) = self.today.as_mut() {
            today.doses.retain(|d| d.key.medication_id != id);
        }
    }
}
