//! `autopilot` CLI entry point.

use abathur::cli::commands::{gate, run, status, stop, validate};
use abathur::cli::{Cli, Commands};
use abathur::infrastructure::config::{CliOverrides, ConfigLoader};
use abathur::infrastructure::logging;
use anyhow::{Context, Result};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let overrides: CliOverrides = (&cli.common).into();

    let config = ConfigLoader::load(&overrides).context("failed to load configuration")?;
    let _logger = logging::logger::LoggerImpl::init(&to_log_config(&config))
        .context("failed to initialize logging")?;

    let exit_code = match cli.command {
        Commands::Run => run::handle_run(config).await?,
        Commands::Status => status::handle_status(&config).await?,
        Commands::Stop => stop::handle_stop(&config).await?,
        Commands::Validate => validate::handle_validate(&config).await?,
        Commands::Gate { task } => gate::handle_gate(&config, task).await?,
    };

    std::process::exit(exit_code);
}

fn to_log_config(config: &abathur::domain::models::config::Config) -> logging::config::LogConfig {
    use logging::config::LogFormat;

    logging::config::LogConfig {
        level: config.logging.level.clone(),
        format: if config.logging.format == "pretty" { LogFormat::Pretty } else { LogFormat::Json },
        log_dir: None,
        enable_stdout: true,
        rotation: Default::default(),
        retention_days: i64::from(config.logging.retention_days),
    }
}
