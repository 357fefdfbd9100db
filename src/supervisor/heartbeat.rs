//! Heartbeat writer: persists a monotonic last-heartbeat timestamp under
//! `STATE_ROOT/analytics/heartbeat` so `autopilot status` can tell a live
//! Supervisor from a crashed one without touching the pid lock (spec §6).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::domain::errors::AutopilotError;

pub struct HeartbeatWriter {
    path: PathBuf,
}

impl HeartbeatWriter {
    pub fn new(state_root: &Path) -> Self {
        Self { path: state_root.join("analytics").join("heartbeat") }
    }

    pub async fn beat(&self, at: DateTime<Utc>) -> Result<(), AutopilotError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AutopilotError::Integrity(format!("create_dir_all {}: {e}", parent.display()))
            })?;
        }
        tokio::fs::write(&self.path, at.timestamp_millis().to_string())
            .await
            .map_err(|e| AutopilotError::Integrity(format!("write {}: {e}", self.path.display())))
    }

    /// Reads the last heartbeat, if any was ever written.
    pub async fn last_beat(&self) -> Result<Option<DateTime<Utc>>, AutopilotError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let millis: i64 = content.trim().parse().map_err(|_| {
                    AutopilotError::Integrity(format!("corrupt heartbeat file: {}", self.path.display()))
                })?;
                Ok(DateTime::from_timestamp_millis(millis))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AutopilotError::Integrity(format!("read {}: {e}", self.path.display()))),
        }
    }

    /// Whether the last heartbeat is within `timeout` of `now` — used by
    /// `autopilot status` to decide liveness without a pid check.
    pub async fn is_alive(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> Result<bool, AutopilotError> {
        Ok(match self.last_beat().await? {
            Some(last) => now - last <= timeout,
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn beat_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let writer = HeartbeatWriter::new(dir.path());
        let now = Utc::now();

        writer.beat(now).await.unwrap();
        let read_back = writer.last_beat().await.unwrap().unwrap();
        assert_eq!(read_back.timestamp_millis(), now.timestamp_millis());
    }

    #[tokio::test]
    async fn no_heartbeat_file_is_not_alive() {
        let dir = tempfile::tempdir().unwrap();
        let writer = HeartbeatWriter::new(dir.path());
        assert!(!writer.is_alive(Utc::now(), chrono::Duration::seconds(30)).await.unwrap());
    }

    #[tokio::test]
    async fn stale_heartbeat_is_not_alive() {
        let dir = tempfile::tempdir().unwrap();
        let writer = HeartbeatWriter::new(dir.path());
        writer.beat(Utc::now() - chrono::Duration::minutes(10)).await.unwrap();
        assert!(!writer.is_alive(Utc::now(), chrono::Duration::seconds(30)).await.unwrap());
    }
}
