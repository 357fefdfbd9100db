//! Tool Runner port (C2) — the sandboxed shell/filesystem/VCS boundary an
//! agent's actions are executed through.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::domain::errors::AutopilotError;

/// Result of a single shell invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// True when stdout or stderr was cut at the output size cap and a
    /// truncation marker was appended (spec §4.2).
    pub truncated: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone)]
pub struct DirEntry {
    pub path: String,
    pub is_dir: bool,
    pub size_bytes: u64,
}

/// VCS status of the working tree the Tool Runner operates in.
#[derive(Debug, Clone)]
pub struct VcsStatus {
    pub branch: String,
    pub dirty_paths: Vec<String>,
}

/// Sandboxed execution boundary. One instance is scoped to a single
/// worktree/path allow-list (spec §4.2 invariant: no path outside the
/// allow-list is ever read or written).
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run a shell command with a hard timeout; the process group is killed
    /// on timeout or cancellation (spec §4.2: kill at 5s default, `nix`
    /// process groups).
    async fn run(&self, command: &[String], timeout: Duration) -> Result<CommandOutput, AutopilotError>;

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, AutopilotError>;

    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<(), AutopilotError>;

    async fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>, AutopilotError>;

    async fn vcs_status(&self) -> Result<VcsStatus, AutopilotError>;

    async fn vcs_diff(&self) -> Result<String, AutopilotError>;

    async fn vcs_stage(&self, paths: &[String]) -> Result<(), AutopilotError>;

    async fn vcs_commit(&self, message: &str) -> Result<String, AutopilotError>;
}
