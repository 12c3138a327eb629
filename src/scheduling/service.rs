//! Async front door to a `ReminderEngine`.
//!
//! The engine runs on a blocking worker (it does SQLite I/O) and drains a
//! command channel in order. UI calls and platform callbacks go through the
//! same channel, so at most one operation touches the notification queue at
//! a time.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::engine::{EventOutcome, ReminderEngine, TriggerOutcome};
use super::error::SchedulingError;
use super::lifecycle::{DeletionReport, NotificationSweep};
use super::store::ReminderStore;
use super::tracker::MarkOutcome;
use crate::models::enums::DoseOutcome;
use crate::models::{AlarmSettings, DoseKey, ScheduledDose};
use crate::notifications::{NotificationCenter, NotificationEvent};

const COMMAND_BUFFER: usize = 64;

type Reply<T> = oneshot::Sender<Result<T, SchedulingError>>;

enum Command {
    TodayDoses(Reply<Vec<ScheduledDose>>),
    NextPendingDose(Reply<Option<ScheduledDose>>),
    TriggerIfDue(Reply<TriggerOutcome>),
    ReconcileNow(Reply<TriggerOutcome>),
    SchedulesChanged(Reply<TriggerOutcome>),
    MarkDose {
        key: DoseKey,
        outcome: DoseOutcome,
        reply: Reply<MarkOutcome>,
    },
    DeleteMedication {
        id: Uuid,
        reply: Reply<DeletionReport>,
    },
    DeactivateMedication {
        id: Uuid,
        reply: Reply<NotificationSweep>,
    },
    AlarmSettings(oneshot::Sender<AlarmSettings>),
    UpdateAlarmSettings {
        settings: AlarmSettings,
        reply: Reply<TriggerOutcome>,
    },
    Notification {
        event: NotificationEvent,
        reply: Option<Reply<EventOutcome>>,
    },
}

pub struct ReminderService;

impl ReminderService {
    /// Start the engine loop.
    ///
    /// The loop stops once every handle is dropped; the join handle yields
    /// the engine back.
    pub fn spawn<S, N>(engine: ReminderEngine<S, N>) -> (ReminderHandle, JoinHandle<ReminderEngine<S, N>>)
    where
        S: ReminderStore + 'static,
        N: NotificationCenter + 'static,
    {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let task = tokio::task::spawn_blocking(move || run(engine, rx));
        (ReminderHandle { tx }, task)
    }
}

fn run<S, N>(mut engine: ReminderEngine<S, N>, mut rx: mpsc::Receiver<Command>) -> ReminderEngine<S, N>
where
    S: ReminderStore,
    N: NotificationCenter,
{
    tracing::info!("Reminder service started");

    while let Some(command) = rx.blocking_recv() {
        match command {
            Command::TodayDoses(reply) => {
                let _ = reply.send(engine.today_doses());
            }
            Command::NextPendingDose(reply) => {
                let _ = reply.send(engine.next_pending_dose());
            }
            Command::TriggerIfDue(reply) => {
                let _ = reply.send(engine.trigger_reconciliation_if_due());
            }
            Command::ReconcileNow(reply) => {
                let _ = reply.send(engine.reconcile_now());
            }
            Command::SchedulesChanged(reply) => {
                let _ = reply.send(engine.schedules_changed());
            }
            Command::MarkDose { key, outcome, reply } => {
                let _ = reply.send(engine.mark_dose(key, outcome));
            }
            Command::DeleteMedication { id, reply } => {
                let _ = reply.send(engine.delete_medication(id));
            }
            Command::DeactivateMedication { id, reply } => {
                let _ = reply.send(engine.deactivate_medication(id));
            }
            Command::AlarmSettings(reply) => {
                let _ = reply.send(engine.alarm_settings());
            }
            Command::UpdateAlarmSettings { settings, reply } => {
                let _ = reply.send(engine.update_alarm_settings(settings));
            }
            Command::Notification { event, reply } => {
                let result = engine.handle_notification(event);
                match reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            tracing::warn!(error = %e, "Notification event failed");
                        }
                    }
                }
            }
        }
    }

    tracing::info!("Reminder service stopped");
    engine
}

/// Cloneable client for the reminder service.
#[derive(Clone)]
pub struct ReminderHandle {
    tx: mpsc::Sender<Command>,
}

impl ReminderHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, SchedulingError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| SchedulingError::EngineStopped)?;
        rx.await.map_err(|_| SchedulingError::EngineStopped)?
    }

    pub async fn today_doses(&self) -> Result<Vec<ScheduledDose>, SchedulingError> {
        self.request(Command::TodayDoses).await
    }

    pub async fn next_pending_dose(&self) -> Result<Option<ScheduledDose>, SchedulingError> {
        self.request(Command::NextPendingDose).await
    }

    pub async fn trigger_reconciliation_if_due(&self) -> Result<TriggerOutcome, SchedulingError> {
        self.request(Command::TriggerIfDue).await
    }

    pub async fn reconcile_now(&self) -> Result<TriggerOutcome, SchedulingError> {
        self.request(Command::ReconcileNow).await
    }

    pub async fn schedules_changed(&self) -> Result<TriggerOutcome, SchedulingError> {
        self.request(Command::SchedulesChanged).await
    }

    pub async fn mark_dose(&self, key: DoseKey, outcome: DoseOutcome) -> Result<MarkOutcome, SchedulingError> {
        self.request(|reply| Command::MarkDose { key, outcome, reply }).await
    }

    pub async fn delete_medication(&self, id: Uuid) -> Result<DeletionReport, SchedulingError> {
        self.request(|reply| Command::DeleteMedication { id, reply }).await
    }

    pub async fn deactivate_medication(&self, id: Uuid) -> Result<NotificationSweep, SchedulingError> {
        self.request(|reply| Command::DeactivateMedication { id, reply }).await
    }

    pub async fn alarm_settings(&self) -> Result<AlarmSettings, SchedulingError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::AlarmSettings(reply))
            .await
            .map_err(|_| SchedulingError::EngineStopped)?;
        rx.await.map_err(|_| SchedulingError::EngineStopped)
    }

    pub async fn update_alarm_settings(&self, settings: AlarmSettings) -> Result<TriggerOutcome, SchedulingError> {
        self.request(|reply| Command::UpdateAlarmSettings { settings, reply }).await
    }

    /// Handle a platform callback and wait for the outcome.
    pub async fn notify(&self, event: NotificationEvent) -> Result<EventOutcome, SchedulingError> {
        self.request(|reply| Command::Notification {
            event,
            reply: Some(reply),
        })
        .await
    }

    /// Enqueue a platform callback without waiting; for use from
    /// synchronous platform hooks. Fails if the channel is full or closed.
    pub fn deliver(&self, event: NotificationEvent) -> Result<(), SchedulingError> {
        self.tx
            .try_send(Command::Notification { event, reply: None })
            .map_err(|_| SchedulingError::EngineStopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::enums::DoseStatus;
    use crate::models::{Medication, MedicationSchedule, TimeOfDay};
    use crate::notifications::{InMemoryNotificationCenter, NotificationAction};
    use crate::scheduling::clock::ManualClock;
    use crate::scheduling::store::SqliteReminderStore;
    use chrono::{Duration, NaiveDate};

    fn setup() -> (ReminderEngine<SqliteReminderStore, InMemoryNotificationCenter>, InMemoryNotificationCenter, ManualClock, Uuid) {
        let start = NaiveDate::from_ymd_opt(2025, 4, 10).unwrap().and_hms_opt(7, 0, 0).unwrap();
        let store = SqliteReminderStore::in_memory().unwrap();
        let med = Medication {
            id: Uuid::new_v4(),
            name: "Levothyroxine".into(),
            dosage: "50".into(),
            unit: "mcg".into(),
            is_active: true,
            created_at: start,
        };
        store.add_medication(&med).unwrap();
        store
            .add_schedule(&MedicationSchedule {
                id: Uuid::new_v4(),
                medication_id: med.id,
                times: vec!["08:00".into(), "20:00".into()],
                is_active: true,
                start_date: None,
                end_date: None,
                created_at: start,
            })
            .unwrap();

        let center = InMemoryNotificationCenter::new();
        let clock = ManualClock::new(start);
        let engine = ReminderEngine::new(store, center.clone(), Box::new(clock.clone()), EngineConfig::default()).unwrap();
        (engine, center, clock, med.id)
    }

    #[tokio::test]
    async fn handle_drives_engine_and_returns_it_on_shutdown() {
        let (engine, center, _clock, _med) = setup();
        let (handle, task) = ReminderService::spawn(engine);

        assert!(handle.trigger_reconciliation_if_due().await.unwrap().ran());
        assert_eq!(handle.today_doses().await.unwrap().len(), 2);
        assert_eq!(center.len(), 2);

        drop(handle);
        let engine = task.await.unwrap();
        assert_eq!(engine.notifications().len(), 2);
    }

    #[tokio::test]
    async fn commands_are_processed_in_order() {
        let (engine, center, clock, med) = setup();
        let (handle, task) = ReminderService::spawn(engine);
        handle.trigger_reconciliation_if_due().await.unwrap();
        clock.advance(Duration::seconds(5));

        let first = center.scheduled()[0].clone();
        handle
            .deliver(NotificationEvent::Action {
                id: first.id,
                data: first.data,
                action: NotificationAction::MarkTaken,
            })
            .unwrap();

        let doses = handle.today_doses().await.unwrap();
        let key = DoseKey::new(med, TimeOfDay::new(8, 0).unwrap());
        assert_eq!(doses.iter().find(|d| d.key == key).unwrap().status, DoseStatus::Taken);
        assert_eq!(center.len(), 1);

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn clones_share_one_engine() {
        let (engine, _center, _clock, med) = setup();
        let (handle, task) = ReminderService::spawn(engine);
        let other = handle.clone();

        let key = DoseKey::new(med, TimeOfDay::new(20, 0).unwrap());
        other.mark_dose(key, DoseOutcome::Skipped).await.unwrap();
        let next = handle.next_pending_dose().await.unwrap().unwrap();
        assert_eq!(next.key.time, TimeOfDay::new(8, 0).unwrap());

        let settings = handle.alarm_settings().await.unwrap();
        assert!(settings.alarms_enabled);

        drop(handle);
        drop(other);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn engine_errors_reach_the_caller() {
        let (engine, _center, _clock, _med) = setup();
        let (handle, task) = ReminderService::spawn(engine);

        let err = handle.delete_medication(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, SchedulingError::Database(_)));

        drop(handle);
        task.await.unwrap();
    }
}
