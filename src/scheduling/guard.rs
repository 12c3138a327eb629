//! When to run a reconciliation pass, and when to ignore triggers.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RunDecision {
    /// No pass has ever completed.
    FirstRun,
    /// The last pass ran on an earlier (or later) calendar day.
    NewDay { last: NaiveDate },
    /// The queue holds no medicine alarms although some are due.
    QueueWiped,
    UpToDate,
}

impl RunDecision {
    pub fn should_run(&self) -> bool {
        !matches!(self, Self::UpToDate)
    }
}

/// Decide whether the once-a-day pass is due.
pub fn should_run(
    last_marker: Option<NaiveDateTime>,
    now: NaiveDateTime,
    existing_medicine_count: usize,
    has_desired: bool,
) -> RunDecision {
    let Some(last) = last_marker else {
        return RunDecision::FirstRun;
    };
    if last.date() != now.date() {
        return RunDecision::NewDay { last: last.date() };
    }
    if existing_medicine_count == 0 && has_desired {
        return RunDecision::QueueWiped;
    }
    RunDecision::UpToDate
}

/// Tracks an in-flight pass plus the cooldown after it.
///
/// While `is_reconciling` holds, triggers and delivery callbacks are dropped.
#[derive(Debug, Clone)]
pub struct ReconciliationGuard {
    in_progress: bool,
    cooldown_until: Option<NaiveDateTime>,
    cooldown: Duration,
}

impl ReconciliationGuard {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            in_progress: false,
            cooldown_until: None,
            cooldown,
        }
    }

    pub fn is_reconciling(&self, now: NaiveDateTime) -> bool {
        self.in_progress || self.cooldown_until.is_some_and(|until| now < until)
    }

    /// Enter a pass. Returns false if one is already running or cooling down.
    pub fn begin(&mut self, now: NaiveDateTime) -> bool {
        if self.is_reconciling(now) {
            return false;
        }
        self.in_progress = true;
        true
    }

    /// Leave a pass; the cooldown starts at `now`.
    pub fn finish(&mut self, now: NaiveDateTime) {
        self.in_progress = false;
        self.cooldown_until = now.checked_add_signed(self.cooldown);
    }

    /// Leave without a cooldown. No-op after `finish`.
    pub fn abandon(&mut self) {
        self.in_progress = false;
    }
}
