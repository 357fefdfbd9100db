//! WIP Controller (C7) — per-worker and global work-in-progress caps.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Notify, RwLock};
use uuid::Uuid;

use crate::domain::models::wip::{WipSlot, WipStatus};

/// Reserves and releases WIP slots. Reservation is idempotent per
/// `task_id` (spec §4.7): a duplicate reserve for a task already holding a
/// slot returns `false` rather than double-counting.
pub struct WipController {
    global_cap: u32,
    per_worker_cap: u32,
    slots: RwLock<HashMap<Uuid, WipSlot>>,
    released: Arc<Notify>,
}

impl WipController {
    pub fn new(global_cap: u32, per_worker_cap: u32) -> Self {
        Self {
            global_cap,
            per_worker_cap,
            slots: RwLock::new(HashMap::new()),
            released: Arc::new(Notify::new()),
        }
    }

    /// Handle the Scheduler can await to be woken when a slot frees up.
    pub fn release_notifier(&self) -> Arc<Notify> {
        self.released.clone()
    }

    pub async fn can_accept(&self, worker_id: &str) -> bool {
        let slots = self.slots.read().await;
        if slots.len() as u32 >= self.global_cap {
            return false;
        }
        let worker_in_use = slots.values().filter(|s| s.worker_id == worker_id).count() as u32;
        worker_in_use < self.per_worker_cap
    }

    /// Reserve a slot for `task_id` against `worker_id`. Returns `false` if
    /// the task already holds a slot or no capacity remains.
    pub async fn reserve(&self, task_id: Uuid, worker_id: impl Into<String>) -> bool {
        let worker_id = worker_id.into();
        let mut slots = self.slots.write().await;
        if slots.contains_key(&task_id) {
            return false;
        }
        if slots.len() as u32 >= self.global_cap {
            return false;
        }
        let worker_in_use = slots.values().filter(|s| s.worker_id == worker_id).count() as u32;
        if worker_in_use >= self.per_worker_cap {
            return false;
        }
        slots.insert(
            task_id,
            WipSlot {
                worker_id,
                task_id,
                reserved_at: Utc::now(),
            },
        );
        true
    }

    /// Release `task_id`'s slot, if held, and wake anything waiting on
    /// `release_notifier` so the Scheduler can re-evaluate readiness.
    pub async fn release(&self, task_id: Uuid) -> Option<WipSlot> {
        let slot = self.slots.write().await.remove(&task_id);
        if slot.is_some() {
            self.released.notify_waiters();
        }
        slot
    }

    pub async fn status(&self) -> WipStatus {
        let slots = self.slots.read().await;
        let mut per_worker_in_use = HashMap::new();
        for slot in slots.values() {
            *per_worker_in_use.entry(slot.worker_id.clone()).or_insert(0u32) += 1;
        }
        WipStatus {
            global_cap: self.global_cap,
            global_in_use: slots.len() as u32,
            per_worker_cap: self.per_worker_cap,
            per_worker_in_use,
        }
    }
}
