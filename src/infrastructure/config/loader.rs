//! Assembles `Config` from compiled-in defaults, `autopilot.yaml`, recognised
//! environment variables, and CLI flag overrides, in that precedence order
//! (spec §6). Grounded on the teacher's `figment`-based hierarchical loader.

use anyhow::{Context, Result};
use figment::providers::{Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid workers: {0}. Must be at least 1")]
    InvalidWorkers(u32),

    #[error("invalid wip_per_worker: {0}. Must be at least 1")]
    InvalidWipPerWorker(u32),

    #[error("invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("database path cannot be empty")]
    EmptyDatabasePath,

    #[error("invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("invalid disk thresholds: pause ({0}%) must be less than stop ({1}%)")]
    InvalidDiskThresholds(u8, u8),

    #[error("invalid safety_profile: {0}. Must be one of: default, strict")]
    InvalidSafetyProfile(String),

    /// Open Question 2 (DESIGN.md): `OFFLINE_MODE` truthy refuses startup
    /// outright. No mocked-output fallback path exists.
    #[error("OFFLINE_MODE is set; Autopilot does not support offline execution")]
    OfflineModeForbidden,
}

/// CLI flags that override everything else when present (spec §6: `--workers
/// N`, `--wip-global N`, `--wip-per-worker N`, `--state-root PATH`,
/// `--dry-run`, `--disable-peer-review`, `--log-level`, `--safety-profile`).
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub workers: Option<u32>,
    pub wip_global: Option<u32>,
    pub wip_per_worker: Option<u32>,
    pub state_root: Option<String>,
    pub dry_run: bool,
    pub disable_peer_review: bool,
    pub log_level: Option<String>,
    pub safety_profile: Option<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads from `autopilot.yaml` (project root, optional), environment,
    /// and compiled-in defaults, then applies `cli` on top and validates.
    pub fn load(cli: &CliOverrides) -> Result<Config> {
        let mut config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file("autopilot.yaml"))
            .extract()
            .context("failed to extract configuration")?;

        Self::apply_env_overrides(&mut config);
        Self::apply_cli_overrides(&mut config, cli);

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Recognised environment variables (spec §6). Unknown variables are
    /// ignored; this is an explicit allow-list rather than a blanket prefix
    /// merge because the names are flat (`SAFETY_MEMORY_MB`, not
    /// `AUTOPILOT_SAFETY__MEMORY_MB`).
    fn apply_env_overrides(config: &mut Config) {
        if let Some(v) = env_string("STATE_ROOT") {
            config.state_root = v;
        }
        if let Some(v) = env_parsed::<u32>("WORKERS") {
            config.workers = v;
        }
        if let Some(v) = env_parsed::<u32>("WIP_GLOBAL") {
            config.wip_global = Some(v);
        }
        if let Some(v) = env_parsed::<u32>("WIP_PER_WORKER") {
            config.wip_per_worker = v;
        }
        if let Some(v) = env_parsed::<u64>("SAFETY_MEMORY_MB") {
            config.safety.memory_mb = v;
        }
        if let Some(v) = env_parsed::<u8>("SAFETY_DISK_PAUSE_PCT") {
            config.safety.disk_pause_pct = v;
        }
        if let Some(v) = env_parsed::<u8>("SAFETY_DISK_STOP_PCT") {
            config.safety.disk_stop_pct = v;
        }
        if let Some(v) = env_bool("ENABLE_PEER_REVIEW") {
            config.disable_peer_review = !v;
        }
        if let Some(v) = env_bool("ENABLE_QUALITY_GRAPH") {
            config.enable_quality_graph = v;
        }
        if let Some(v) = env_parsed::<u64>("HEARTBEAT_INTERVAL_MS") {
            config.heartbeat_interval_ms = v;
        }
        if let Some(v) = env_parsed::<u64>("HEARTBEAT_TIMEOUT_MS") {
            config.heartbeat_timeout_ms = v;
        }
        if let Some(v) = env_string("ANTHROPIC_API_KEY") {
            config.substrates.anthropic.api_key = Some(v);
        }
        if let Some(v) = env_bool("OFFLINE_MODE") {
            config.offline_mode = v;
        }
    }

    fn apply_cli_overrides(config: &mut Config, cli: &CliOverrides) {
        if let Some(v) = cli.workers {
            config.workers = v;
        }
        if let Some(v) = cli.wip_global {
            config.wip_global = Some(v);
        }
        if let Some(v) = cli.wip_per_worker {
            config.wip_per_worker = v;
        }
        if let Some(v) = &cli.state_root {
            config.state_root = v.clone();
        }
        if cli.dry_run {
            config.dry_run = true;
        }
        if cli.disable_peer_review {
            config.disable_peer_review = true;
        }
        if let Some(v) = &cli.log_level {
            config.logging.level = v.clone();
        }
        if let Some(v) = &cli.safety_profile {
            config.safety_profile = v.clone();
        }
    }

    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.workers == 0 {
            return Err(ConfigError::InvalidWorkers(config.workers));
        }
        if config.wip_per_worker == 0 {
            return Err(ConfigError::InvalidWipPerWorker(config.wip_per_worker));
        }
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.safety.disk_pause_pct >= config.safety.disk_stop_pct {
            return Err(ConfigError::InvalidDiskThresholds(
                config.safety.disk_pause_pct,
                config.safety.disk_stop_pct,
            ));
        }

        let valid_safety_profiles = ["default", "strict"];
        if !valid_safety_profiles.contains(&config.safety_profile.as_str()) {
            return Err(ConfigError::InvalidSafetyProfile(config.safety_profile.clone()));
        }

        if config.offline_mode {
            return Err(ConfigError::OfflineModeForbidden);
        }

        Ok(())
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    env_string(key).map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}
