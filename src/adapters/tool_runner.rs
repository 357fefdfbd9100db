//! Sandboxed shell/filesystem/VCS boundary (C2) — every side-effecting
//! action an agent or critic performs goes through this adapter.

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::domain::errors::AutopilotError;
use crate::domain::ports::{CommandOutput, DirEntry, ToolRunner, VcsStatus};

/// Grace period between a polite terminate and a forcible kill of a
/// timed-out child's process group (spec §4.2).
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Default per-stream output cap before truncation (spec §4.2).
const DEFAULT_OUTPUT_CAP_BYTES: usize = 16 * 1024 * 1024;

const TRUNCATION_MARKER: &str = "\n...[output truncated]...\n";

/// A `ToolRunner` confined to one worktree directory. Every path argument is
/// canonicalized and checked against `root` before use; nothing outside it
/// is ever read, written, or passed to a shell command.
pub struct LocalToolRunner {
    root: PathBuf,
    output_cap_bytes: usize,
}

impl LocalToolRunner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            output_cap_bytes: DEFAULT_OUTPUT_CAP_BYTES,
        }
    }

    pub fn with_output_cap_bytes(mut self, cap: usize) -> Self {
        self.output_cap_bytes = cap;
        self
    }

    /// Resolves `path` against the allow-listed root, rejecting traversal
    /// outside it even via `..` components (spec §4.2).
    fn resolve(&self, path: &Path) -> Result<PathBuf, AutopilotError> {
        let joined = if path.is_absolute() { path.to_path_buf() } else { self.root.join(path) };

        let mut normalized = PathBuf::new();
        for component in joined.components() {
            match component {
                std::path::Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(AutopilotError::ProcessFailure {
                            exit_code: None,
                            message: format!("path escapes allow-list root: {}", path.display()),
                        });
                    }
                }
                std::path::Component::CurDir => {}
                other => normalized.push(other.as_os_str()),
            }
        }

        if !normalized.starts_with(&self.root) {
            return Err(AutopilotError::ProcessFailure {
                exit_code: None,
                message: format!("path escapes allow-list root: {}", path.display()),
            });
        }

        Ok(normalized)
    }

    fn truncate(&self, mut bytes: Vec<u8>) -> (String, bool) {
        let truncated = bytes.len() > self.output_cap_bytes;
        if truncated {
            bytes.truncate(self.output_cap_bytes);
        }
        let mut text = String::from_utf8_lossy(&bytes).into_owned();
        if truncated {
            text.push_str(TRUNCATION_MARKER);
        }
        (text, truncated)
    }

    async fn git(&self, args: &[&str]) -> Result<CommandOutput, AutopilotError> {
        let owned: Vec<String> = std::iter::once("git".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect();
        self.run(&owned, Duration::from_secs(30)).await
    }
}

#[async_trait]
impl ToolRunner for LocalToolRunner {
    async fn run(&self, command: &[String], timeout: Duration) -> Result<CommandOutput, AutopilotError> {
        let Some((program, args)) = command.split_first() else {
            return Err(AutopilotError::ProcessFailure {
                exit_code: None,
                message: "empty command".to_string(),
            });
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // New process group so a single signal reaches the whole subtree
        // (spec §4.2).
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| AutopilotError::ProcessFailure {
            exit_code: None,
            message: format!("spawn failed for {program}: {e}"),
        })?;

        let pid = child
            .id()
            .ok_or_else(|| AutopilotError::ProcessFailure { exit_code: None, message: "child already reaped".into() })?;
        let pgid = Pid::from_raw(pid as i32);

        let mut stdout_pipe = child.stdout.take().expect("piped stdout");
        let mut stderr_pipe = child.stderr.take().expect("piped stderr");
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        let read_and_wait = async {
            let (stdout_res, stderr_res, status_res) = tokio::join!(
                stdout_pipe.read_to_end(&mut stdout_buf),
                stderr_pipe.read_to_end(&mut stderr_buf),
                child.wait(),
            );
            stdout_res.ok();
            stderr_res.ok();
            status_res
        };

        match tokio::time::timeout(timeout, read_and_wait).await {
            Ok(status_res) => {
                let status = status_res.map_err(|e| AutopilotError::ProcessFailure {
                    exit_code: None,
                    message: format!("wait failed: {e}"),
                })?;
                let (stdout, stdout_truncated) = self.truncate(stdout_buf);
                let (stderr, stderr_truncated) = self.truncate(stderr_buf);
                Ok(CommandOutput {
                    exit_code: status.code().unwrap_or(-1),
                    stdout,
                    stderr,
                    truncated: stdout_truncated || stderr_truncated,
                })
            }
            Err(_) => {
                // Polite terminate, then grace period, then forcible kill
                // of the whole process group.
                let _ = signal::killpg(pgid, Signal::SIGTERM);
                tokio::time::sleep(KILL_GRACE).await;
                let _ = signal::killpg(pgid, Signal::SIGKILL);
                let _ = child.wait().await;

                Err(AutopilotError::ProcessFailure {
                    exit_code: None,
                    message: format!("command timed out after {:?}: {}", timeout, command.join(" ")),
                })
            }
        }
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, AutopilotError> {
        let resolved = self.resolve(path)?;
        tokio::fs::read(&resolved).await.map_err(|e| AutopilotError::ProcessFailure {
            exit_code: None,
            message: format!("read {}: {e}", resolved.display()),
        })
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<(), AutopilotError> {
        let resolved = self.resolve(path)?;
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| AutopilotError::ProcessFailure {
                exit_code: None,
                message: format!("create_dir_all {}: {e}", parent.display()),
            })?;
        }

        // Write to a sibling temp file and rename, so a reader never
        // observes a partial write (spec §4.2 filesystem contract).
        let tmp = resolved.with_extension(format!(
            "{}.tmp",
            resolved.extension().and_then(|e| e.to_str()).unwrap_or("tmp")
        ));
        tokio::fs::write(&tmp, content).await.map_err(|e| AutopilotError::ProcessFailure {
            exit_code: None,
            message: format!("write {}: {e}", tmp.display()),
        })?;
        tokio::fs::rename(&tmp, &resolved).await.map_err(|e| AutopilotError::ProcessFailure {
            exit_code: None,
            message: format!("rename {} -> {}: {e}", tmp.display(), resolved.display()),
        })
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>, AutopilotError> {
        let resolved = self.resolve(path)?;
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&resolved).await.map_err(|e| AutopilotError::ProcessFailure {
            exit_code: None,
            message: format!("list_dir {}: {e}", resolved.display()),
        })?;

        while let Some(entry) = read_dir.next_entry().await.map_err(|e| AutopilotError::ProcessFailure {
            exit_code: None,
            message: format!("read_dir entry: {e}"),
        })? {
            let metadata = entry.metadata().await.map_err(|e| AutopilotError::ProcessFailure {
                exit_code: None,
                message: format!("metadata for {}: {e}", entry.path().display()),
            })?;
            entries.push(DirEntry {
                path: entry.path().display().to_string(),
                is_dir: metadata.is_dir(),
                size_bytes: metadata.len(),
            });
        }

        Ok(entries)
    }

    async fn vcs_status(&self) -> Result<VcsStatus, AutopilotError> {
        let branch_out = self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        let status_out = self.git(&["status", "--porcelain"]).await?;

        if !branch_out.success() || !status_out.success() {
            return Err(AutopilotError::ProcessFailure {
                exit_code: Some(status_out.exit_code),
                message: status_out.stderr,
            });
        }

        let dirty_paths = status_out
            .stdout
            .lines()
            .filter_map(|line| line.get(3..).map(str::to_string))
            .collect();

        Ok(VcsStatus {
            branch: branch_out.stdout.trim().to_string(),
            dirty_paths,
        })
    }

    async fn vcs_diff(&self) -> Result<String, AutopilotError> {
        let out = self.git(&["diff", "HEAD"]).await?;
        if !out.success() {
            return Err(AutopilotError::ProcessFailure { exit_code: Some(out.exit_code), message: out.stderr });
        }
        Ok(out.stdout)
    }

    async fn vcs_stage(&self, paths: &[String]) -> Result<(), AutopilotError> {
        let mut args = vec!["add".to_string()];
        args.extend(paths.iter().cloned());
        let out = self.run(&std::iter::once("git".to_string()).chain(args).collect::<Vec<_>>(), Duration::from_secs(30)).await?;
        if !out.success() {
            return Err(AutopilotError::ProcessFailure { exit_code: Some(out.exit_code), message: out.stderr });
        }
        Ok(())
    }

    async fn vcs_commit(&self, message: &str) -> Result<String, AutopilotError> {
        let out = self.git(&["commit", "-m", message]).await?;
        if !out.success() {
            return Err(AutopilotError::ProcessFailure { exit_code: Some(out.exit_code), message: out.stderr });
        }
        let rev = self.git(&["rev-parse", "HEAD"]).await?;
        Ok(rev.stdout.trim().to_string())
    }
}
