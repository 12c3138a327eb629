//! Dose scheduling and notification reconciliation.
//!
//! `resolver` turns stored schedules into today's doses, `reconciler` aligns
//! the OS queue with them, `guard` decides when a pass is due, `tracker` and
//! `lifecycle` handle dose outcomes and medication removal. `engine` ties them
//! together; `service` runs an engine behind a channel.

pub mod clock;
pub mod engine;
pub mod error;
pub mod guard;
pub mod lifecycle;
pub mod reconciler;
pub mod resolver;
pub mod service;
pub mod store;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{EventOutcome, IgnoreReason, ReminderEngine, SkipReason, TriggerOutcome};
pub use error::SchedulingError;
pub use guard::{ReconciliationGuard, RunDecision};
pub use lifecycle::{DeletionReport, NotificationSweep};
pub use reconciler::{DiscardReason, DiscardedDose, ReconciliationPlan, ReconciliationReport};
pub use resolver::resolve_today;
pub use service::{ReminderHandle, ReminderService};
pub use store::{DoseLogStore, EngineSettingsStore, MedicationStore, ReminderStore, SqliteReminderStore};
pub use tracker::MarkOutcome;
