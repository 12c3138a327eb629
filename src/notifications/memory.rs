//! Process-local notification queue.
//!
//! Backs the CLI runner and the engine tests. Clones share one queue, so a
//! test can hand one clone to the engine and inspect the other. Failure
//! injection mimics the OS calls misbehaving.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use super::{NotificationCenter, NotificationError, NotificationEvent};
use crate::models::{NotificationId, NotificationPayload, NotificationRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledNotification {
    pub id: NotificationId,
    pub fire_in_secs: u32,
    pub data: Value,
}

#[derive(Default)]
struct Queue {
    scheduled: BTreeMap<NotificationId, ScheduledNotification>,
    next_id: u64,
    cancel_calls: usize,
    create_calls: usize,
    fail_cancels: usize,
    fail_creates: usize,
    fail_lists: usize,
    /// Cancels that report success but leave the entry in place.
    lagging_cancels: usize,
}

#[derive(Clone, Default)]
pub struct InMemoryNotificationCenter {
    queue: Arc<Mutex<Queue>>,
}

impl InMemoryNotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Put an arbitrary notification on the queue (e.g. another feature's).
    pub fn insert_raw(&self, fire_in_secs: u32, data: Value) -> NotificationId {
        let mut queue = self.queue();
        let id = next_id(&mut queue);
        queue.scheduled.insert(
            id.clone(),
            ScheduledNotification {
                id: id.clone(),
                fire_in_secs,
                data,
            },
        );
        id
    }

    /// Snapshot of the queue ordered by fire time.
    pub fn scheduled(&self) -> Vec<ScheduledNotification> {
        let mut all: Vec<_> = self.queue().scheduled.values().cloned().collect();
        all.sort_by(|a, b| a.fire_in_secs.cmp(&b.fire_in_secs).then(a.id.cmp(&b.id)));
        all
    }

    pub fn len(&self) -> usize {
        self.queue().scheduled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wipe the queue, as an OS-level "clear all" would.
    pub fn clear_all(&self) {
        self.queue().scheduled.clear();
    }

    /// Remove a notification and produce the platform's delivery callback.
    pub fn fire(&self, id: &NotificationId) -> Option<NotificationEvent> {
        let entry = self.queue().scheduled.remove(id)?;
        Some(NotificationEvent::Delivered {
            id: entry.id,
            data: entry.data,
        })
    }

    pub fn cancel_calls(&self) -> usize {
        self.queue().cancel_calls
    }

    pub fn create_calls(&self) -> usize {
        self.queue().create_calls
    }

    pub fn fail_next_cancels(&self, count: usize) {
        self.queue().fail_cancels = count;
    }

    pub fn fail_next_creates(&self, count: usize) {
        self.queue().fail_creates = count;
    }

    pub fn fail_next_lists(&self, count: usize) {
        self.queue().fail_lists = count;
    }

    pub fn lag_next_cancels(&self, count: usize) {
        self.queue().lagging_cancels = count;
    }
}

fn next_id(queue: &mut Queue) -> NotificationId {
    queue.next_id += 1;
    NotificationId(format!("local-{}", queue.next_id))
}

impl NotificationCenter for InMemoryNotificationCenter {
    fn list_scheduled(&self) -> Result<Vec<NotificationRecord>, NotificationError> {
        let mut queue = self.queue();
        if queue.fail_lists > 0 {
            queue.fail_lists -= 1;
            return Err(NotificationError::Platform("list unavailable".into()));
        }
        Ok(queue
            .scheduled
            .values()
            .map(|n| NotificationRecord {
                id: n.id.clone(),
                data: n.data.clone(),
            })
            .collect())
    }

    fn cancel(&mut self, id: &NotificationId) -> Result<(), NotificationError> {
        let mut queue = self.queue();
        queue.cancel_calls += 1;
        if queue.fail_cancels > 0 {
            queue.fail_cancels -= 1;
            return Err(NotificationError::Platform(format!("cancel {id} rejected")));
        }
        if queue.lagging_cancels > 0 {
            queue.lagging_cancels -= 1;
            return Ok(());
        }
        queue
            .scheduled
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| NotificationError::NotFound(id.clone()))
    }

    fn schedule_after(
        &mut self,
        seconds: u32,
        payload: &NotificationPayload,
    ) -> Result<NotificationId, NotificationError> {
        let mut queue = self.queue();
        queue.create_calls += 1;
        if queue.fail_creates > 0 {
            queue.fail_creates -= 1;
            return Err(NotificationError::Platform("schedule rejected".into()));
        }
        let id = next_id(&mut queue);
        queue.scheduled.insert(
            id.clone(),
            ScheduledNotification {
                id: id.clone(),
                fire_in_secs: seconds,
                data: payload.to_data(),
            },
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clones_share_one_queue() {
        let a = InMemoryNotificationCenter::new();
        let b = a.clone();
        a.insert_raw(10, json!({"type": "water"}));
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn cancel_unknown_is_not_found() {
        let mut center = InMemoryNotificationCenter::new();
        let err = center.cancel(&"ghost".into()).unwrap_err();
        assert_eq!(err, NotificationError::NotFound("ghost".into()));
    }

    #[test]
    fn injected_failures_are_consumed_once() {
        let mut center = InMemoryNotificationCenter::new();
        let id = center.insert_raw(5, json!({}));
        center.fail_next_cancels(1);
        assert!(center.cancel(&id).is_err());
        assert!(center.cancel(&id).is_ok());
        assert_eq!(center.cancel_calls(), 2);
        assert!(center.is_empty());
    }

    #[test]
    fn lagging_cancel_leaves_entry() {
        let mut center = InMemoryNotificationCenter::new();
        let id = center.insert_raw(5, json!({}));
        center.lag_next_cancels(1);
        assert!(center.cancel(&id).is_ok());
        assert_eq!(center.len(), 1);
    }

    #[test]
    fn fire_removes_and_reports_delivery() {
        let center = InMemoryNotificationCenter::new();
        let id = center.insert_raw(5, json!({"type": "medicine"}));
        let event = center.fire(&id).unwrap();
        assert_eq!(event.id(), &id);
        assert!(center.is_empty());
        assert!(center.fire(&id).is_none());
    }

    #[test]
    fn list_failure_is_platform_error() {
        let center = InMemoryNotificationCenter::new();
        center.fail_next_lists(1);
        assert!(matches!(
            center.list_scheduled(),
            Err(NotificationError::Platform(_))
        ));
        assert!(center.list_scheduled().unwrap().is_empty());
    }
}
