//! WIP Slot — the Scheduler/WIP Controller's (C7) reservation record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A reservation of one unit of work-in-progress capacity against either a
/// specific worker or the global pool. Reservation is idempotent by
/// `(worker_id, task_id)` (spec §4.7): reserving the same task twice for the
/// same worker is a no-op, not a double count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WipSlot {
    pub worker_id: String,
    pub task_id: Uuid,
    pub reserved_at: DateTime<Utc>,
}

/// Snapshot of WIP utilization, returned by `WipController::status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WipStatus {
    pub global_cap: u32,
    pub global_in_use: u32,
    pub per_worker_cap: u32,
    pub per_worker_in_use: std::collections::HashMap<String, u32>,
}

impl WipStatus {
    pub fn global_available(&self) -> u32 {
        self.global_cap.saturating_sub(self.global_in_use)
    }

    pub fn worker_available(&self, worker_id: &str) -> u32 {
        let used = self.per_worker_in_use.get(worker_id).copied().unwrap_or(0);
        self.per_worker_cap.saturating_sub(used)
    }
}
