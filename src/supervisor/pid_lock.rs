//! Single-instance lock (spec §4.10, §9): pid + start time + a command
//! signature, so a stale lock from a crashed process can be told apart from
//! a live competing instance and safely taken over.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::errors::AutopilotError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockContents {
    pid: u32,
    started_at_unix_ms: i64,
    command_signature: String,
}

/// Held for the process lifetime; dropping it releases the lock file.
pub struct PidLock {
    path: PathBuf,
}

impl PidLock {
    /// Acquires the lock at `path`, refusing if a live process already holds
    /// it. A lock file whose pid is no longer running is treated as stale
    /// and silently replaced.
    pub fn acquire(path: impl AsRef<Path>, now_unix_ms: i64) -> Result<Self, AutopilotError> {
        let path = path.as_ref().to_path_buf();

        if let Some(existing) = Self::read(&path)? {
            if process_is_alive(existing.pid) {
                return Err(AutopilotError::Integrity(format!(
                    "another instance (pid {}) already holds the lock at {}",
                    existing.pid,
                    path.display()
                )));
            }
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AutopilotError::Integrity(format!("create_dir_all {}: {e}", parent.display()))
            })?;
        }

        let contents = LockContents {
            pid: std::process::id(),
            started_at_unix_ms: now_unix_ms,
            command_signature: command_signature(),
        };
        let serialized = serde_json::to_string(&contents)?;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| AutopilotError::Integrity(format!("open {}: {e}", path.display())))?;
        file.write_all(serialized.as_bytes())
            .map_err(|e| AutopilotError::Integrity(format!("write {}: {e}", path.display())))?;

        Ok(Self { path })
    }

    /// Reads the pid recorded in the lock file at `path`, if any, without
    /// acquiring it — used by `autopilot stop` to find who to signal.
    pub fn read_pid(path: impl AsRef<Path>) -> Result<Option<u32>, AutopilotError> {
        Ok(Self::read(path.as_ref())?.map(|c| c.pid))
    }

    fn read(path: &Path) -> Result<Option<LockContents>, AutopilotError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content).ok()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AutopilotError::Integrity(format!("read {}: {e}", path.display()))),
        }
    }

    pub fn release(self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn command_signature() -> String {
    std::env::args().collect::<Vec<_>>().join(" ")
}

#[cfg(unix)]
fn process_is_alive(pid: u32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
fn process_is_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquires_and_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pid.lock");

        let lock = PidLock::acquire(&path, 0).unwrap();
        assert!(path.exists());
        lock.release();
        assert!(!path.exists());
    }

    #[test]
    fn second_acquire_by_live_process_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pid.lock");

        let _lock = PidLock::acquire(&path, 0).unwrap();
        let err = PidLock::acquire(&path, 1).unwrap_err();
        assert!(matches!(err, AutopilotError::Integrity(_)));
    }

    #[test]
    fn stale_lock_from_dead_pid_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pid.lock");

        let contents = LockContents {
            pid: 999_999,
            started_at_unix_ms: 0,
            command_signature: "stale".to_string(),
        };
        std::fs::write(&path, serde_json::to_string(&contents).unwrap()).unwrap();

        let lock = PidLock::acquire(&path, 1).unwrap();
        lock.release();
    }
}
