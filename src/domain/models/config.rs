use serde::{Deserialize, Serialize};

/// Top-level configuration, assembled by `ConfigLoader` from CLI flags, env
/// vars, `autopilot.yaml`, and compiled-in defaults (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Root directory for evidence, audit log, and the pid lock. Defaults to
    /// `.autopilot` under the current working directory.
    #[serde(default = "default_state_root")]
    pub state_root: String,

    /// Number of concurrent workers pulling tasks from the Scheduler.
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Global WIP cap. Defaults to `workers` when unset (spec §4.7).
    #[serde(default)]
    pub wip_global: Option<u32>,

    /// Per-worker WIP cap.
    #[serde(default = "default_wip_per_worker")]
    pub wip_per_worker: u32,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub safety: SafetyConfig,

    #[serde(default)]
    pub model_routing: ModelRoutingSettings,

    #[serde(default)]
    pub substrates: SubstratesConfig,

    /// Run tasks through the scheduler and phase machine without ever
    /// dispatching to an agent or mutating the store (spec §6 `--dry-run`).
    #[serde(default)]
    pub dry_run: bool,

    /// Disable the peer-review consensus step of the Quality Gate.
    #[serde(default)]
    pub disable_peer_review: bool,

    #[serde(default)]
    pub enable_quality_graph: bool,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,

    /// Refuses to start the Supervisor when true (Open Question 2,
    /// DESIGN.md): no mocked-output fallback exists.
    #[serde(default)]
    pub offline_mode: bool,

    #[serde(default = "default_safety_profile")]
    pub safety_profile: String,
}

fn default_state_root() -> String {
    ".autopilot".to_string()
}

const fn default_workers() -> u32 {
    4
}

const fn default_wip_per_worker() -> u32 {
    1
}

const fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

const fn default_heartbeat_timeout_ms() -> u64 {
    120_000
}

fn default_safety_profile() -> String {
    "default".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_root: default_state_root(),
            workers: default_workers(),
            wip_global: None,
            wip_per_worker: default_wip_per_worker(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            safety: SafetyConfig::default(),
            model_routing: ModelRoutingSettings::default(),
            substrates: SubstratesConfig::default(),
            dry_run: false,
            disable_peer_review: false,
            enable_quality_graph: false,
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            offline_mode: false,
            safety_profile: default_safety_profile(),
        }
    }
}

impl Config {
    /// Effective global WIP cap: `wip_global` if set, else `workers`.
    pub fn effective_wip_global(&self) -> u32 {
        self.wip_global.unwrap_or(self.workers)
    }

    pub fn evidence_dir(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.state_root).join("evidence")
    }

    pub fn audit_log_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.state_root)
            .join("analytics")
            .join("audit.jsonl")
    }

    pub fn pid_lock_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.state_root).join("pid.lock")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".autopilot/autopilot.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

const fn default_retention_days() -> u32 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            retention_days: default_retention_days(),
        }
    }
}

/// Resource and runaway-cost guardrails the Supervisor's safety monitor
/// polls on its 10s/60s/5m cadence (spec §4.10, §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SafetyConfig {
    #[serde(default = "default_memory_mb")]
    pub memory_mb: u64,

    #[serde(default = "default_disk_pause_pct")]
    pub disk_pause_pct: u8,

    #[serde(default = "default_disk_stop_pct")]
    pub disk_stop_pct: u8,

    #[serde(default = "default_max_spend_usd")]
    pub max_spend_usd_per_hour: f64,
}

const fn default_memory_mb() -> u64 {
    4096
}

const fn default_disk_pause_pct() -> u8 {
    85
}

const fn default_disk_stop_pct() -> u8 {
    95
}

const fn default_max_spend_usd() -> f64 {
    25.0
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            memory_mb: default_memory_mb(),
            disk_pause_pct: default_disk_pause_pct(),
            disk_stop_pct: default_disk_stop_pct(),
            max_spend_usd_per_hour: default_max_spend_usd(),
        }
    }
}

/// Model Router tuning (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ModelRoutingSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_simple_model")]
    pub simple_model: String,

    #[serde(default = "default_moderate_model")]
    pub moderate_model: String,

    #[serde(default = "default_complex_model")]
    pub complex_model: String,

    #[serde(default = "default_critical_model")]
    pub critical_model: String,

    #[serde(default)]
    pub architect_always_complex: bool,

    /// Maximum complexity-tier escalations before giving up with
    /// `NoEligibleModel` (spec §4.3 step 4).
    #[serde(default = "default_max_escalations")]
    pub max_escalations: u32,
}

fn default_true() -> bool {
    true
}

fn default_simple_model() -> String {
    "claude-haiku-4-5".to_string()
}

fn default_moderate_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_complex_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_critical_model() -> String {
    "claude-opus-4-1".to_string()
}

const fn default_max_escalations() -> u32 {
    2
}

impl Default for ModelRoutingSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            simple_model: default_simple_model(),
            moderate_model: default_moderate_model(),
            complex_model: default_complex_model(),
            critical_model: default_critical_model(),
            architect_always_complex: false,
            max_escalations: default_max_escalations(),
        }
    }
}

/// LLM substrate (Agent Pool provider) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SubstratesConfig {
    #[serde(default = "default_substrate")]
    pub default_substrate: String,

    #[serde(default)]
    pub anthropic: AnthropicSubstrateConfig,
}

fn default_substrate() -> String {
    "anthropic".to_string()
}

impl Default for SubstratesConfig {
    fn default() -> Self {
        Self {
            default_substrate: default_substrate(),
            anthropic: AnthropicSubstrateConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AnthropicSubstrateConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_rate_limit_rps")]
    pub rate_limit_rps: f64,

    #[serde(default = "default_rate_limit_burst")]
    pub rate_limit_burst: u32,
}

const fn default_request_timeout_secs() -> u64 {
    120
}

const fn default_rate_limit_rps() -> f64 {
    5.0
}

const fn default_rate_limit_burst() -> u32 {
    10
}

impl Default for AnthropicSubstrateConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            request_timeout_secs: default_request_timeout_secs(),
            rate_limit_rps: default_rate_limit_rps(),
            rate_limit_burst: default_rate_limit_burst(),
        }
    }
}
