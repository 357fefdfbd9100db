//! CLI interface module — command definitions, flag parsing, and terminal
//! output helpers (spec §6's `autopilot` binary).

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::infrastructure::config::CliOverrides;

/// Flags common to every subcommand (spec §6).
#[derive(Debug, Clone, clap::Args)]
pub struct CommonArgs {
    /// Number of concurrent workers pulling tasks from the Scheduler.
    #[arg(long, global = true)]
    pub workers: Option<u32>,

    /// Global work-in-progress cap.
    #[arg(long = "wip-global", global = true)]
    pub wip_global: Option<u32>,

    /// Per-worker work-in-progress cap.
    #[arg(long = "wip-per-worker", global = true)]
    pub wip_per_worker: Option<u32>,

    /// Filesystem root for evidence, audit log, and the pid lock.
    #[arg(long = "state-root", global = true)]
    pub state_root: Option<String>,

    /// Run through the scheduler and phase machine without dispatching to
    /// an agent or mutating the store.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Skip the Quality Gate's peer-review consensus step.
    #[arg(long = "disable-peer-review", global = true)]
    pub disable_peer_review: bool,

    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[arg(long = "safety-profile", global = true, value_parser = ["default", "strict"])]
    pub safety_profile: Option<String>,
}

impl From<&CommonArgs> for CliOverrides {
    fn from(args: &CommonArgs) -> Self {
        Self {
            workers: args.workers,
            wip_global: args.wip_global,
            wip_per_worker: args.wip_per_worker,
            state_root: args.state_root.clone(),
            dry_run: args.dry_run,
            disable_peer_review: args.disable_peer_review,
            log_level: args.log_level.clone(),
            safety_profile: args.safety_profile.clone(),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "autopilot", version, about = "Multi-agent work orchestrator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the supervisor in the foreground.
    Run,
    /// Read the current heartbeat and PID lock.
    Status,
    /// Send SIGTERM to the running supervisor, escalating to SIGKILL after 5s.
    Stop,
    /// Load and validate the roadmap and evidence-bundle invariants.
    Validate,
    /// Run the Quality Gate off-line against an existing evidence bundle.
    Gate {
        /// Task id to gate.
        task: uuid::Uuid,
    },
}
