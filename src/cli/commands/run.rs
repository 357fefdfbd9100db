//! `autopilot run` — start the supervisor in the foreground (spec §6).

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::adapters::sqlite::{initialize_default_database, SqliteAgentRepository, SqliteEvidenceAuditStore, SqliteTaskRepository};
use crate::adapters::substrates::{AnthropicConfig, AnthropicSubstrate};
use crate::adapters::tool_runner::LocalToolRunner;
use crate::cli::output::progress::create_spinner;
use crate::domain::models::config::Config;
use crate::domain::ports::{AgentSubstrate, AuditSink, EvidenceStore, ToolRunner};
use crate::supervisor::{exit_code, PidLock, Supervisor};

pub async fn handle_run(config: Config) -> Result<i32> {
    let state_root = std::path::PathBuf::from(&config.state_root);
    std::fs::create_dir_all(&state_root).context("create state root")?;

    let lock = match PidLock::acquire(&config.pid_lock_path(), now_unix_ms()) {
        Ok(lock) => lock,
        Err(e) => {
            eprintln!("failed to acquire pid lock: {e}");
            return Ok(exit_code::LOCK_CONFLICT);
        }
    };

    let pool = initialize_default_database(&state_root).await.context("initialize database")?;
    let task_repo = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let agent_repo = Arc::new(SqliteAgentRepository::new(pool.clone()));
    let evidence: Arc<dyn EvidenceStore> = Arc::new(SqliteEvidenceAuditStore::new(pool.clone()));
    let audit: Arc<dyn AuditSink> = Arc::new(SqliteEvidenceAuditStore::new(pool));

    let anthropic_config = AnthropicConfig::from_settings(&config.substrates.anthropic)?;
    let substrate: Arc<dyn AgentSubstrate> = Arc::new(AnthropicSubstrate::new(anthropic_config)?);

    let cwd = std::env::current_dir().context("determine working directory")?;
    let tool_runner: Arc<dyn ToolRunner> = Arc::new(LocalToolRunner::new(cwd));

    let spinner = create_spinner();
    spinner.set_message("starting supervisor");

    let supervisor = Arc::new(
        Supervisor::new(config, task_repo, agent_repo, evidence, audit, substrate, tool_runner)
            .await
            .context("construct supervisor")?,
    );

    spinner.finish_with_message("supervisor running");

    let reason = supervisor.run().await;
    lock.release();
    Ok(reason.exit_code())
}

fn now_unix_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
