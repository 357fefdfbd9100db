//! Safety monitor: polls memory, disk, and spend rate against
//! `SafetyConfig` and raises `AutopilotError::SafetyBreach` when a stop
//! threshold is crossed (spec §4.10, §9). A pause threshold only logs a
//! warning and lets the Operations Manager shift into `Stabilize`.

use std::sync::Arc;

use tracing::warn;

use crate::domain::errors::AutopilotError;
use crate::domain::models::config::SafetyConfig;
use crate::domain::models::{Actor, AuditEvent, AuditEventKind};
use crate::domain::ports::AuditSink;

/// System resource sample, abstracted so the monitor is testable without a
/// real `/proc` or `statvfs` read.
pub trait ResourceProbe: Send + Sync {
    fn memory_used_mb(&self) -> u64;
    fn disk_used_pct(&self) -> u8;
}

/// Reads `/proc/meminfo` and the state root's filesystem usage on Linux.
pub struct SystemResourceProbe {
    state_root: std::path::PathBuf,
}

impl SystemResourceProbe {
    pub fn new(state_root: impl Into<std::path::PathBuf>) -> Self {
        Self { state_root: state_root.into() }
    }
}

impl ResourceProbe for SystemResourceProbe {
    fn memory_used_mb(&self) -> u64 {
        let Ok(contents) = std::fs::read_to_string("/proc/meminfo") else {
            return 0;
        };
        let mut total_kb = 0u64;
        let mut available_kb = 0u64;
        for line in contents.lines() {
            if let Some(rest) = line.strip_prefix("MemTotal:") {
                total_kb = parse_kb(rest);
            } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
                available_kb = parse_kb(rest);
            }
        }
        total_kb.saturating_sub(available_kb) / 1024
    }

    fn disk_used_pct(&self) -> u8 {
        let Ok(stat) = nix::sys::statvfs::statvfs(&self.state_root) else {
            return 0;
        };
        let total_blocks = stat.blocks();
        if total_blocks == 0 {
            return 0;
        }
        let free_blocks = stat.blocks_available();
        let used_ratio = 1.0 - (free_blocks as f64 / total_blocks as f64);
        ((used_ratio * 100.0).round()).clamp(0.0, 100.0) as u8
    }
}

fn parse_kb(s: &str) -> u64 {
    s.split_whitespace().next().and_then(|v| v.parse().ok()).unwrap_or(0)
}

pub struct SafetyMonitor {
    config: SafetyConfig,
    probe: Arc<dyn ResourceProbe>,
    audit: Arc<dyn AuditSink>,
}

impl SafetyMonitor {
    pub fn new(config: SafetyConfig, probe: Arc<dyn ResourceProbe>, audit: Arc<dyn AuditSink>) -> Self {
        Self { config, probe, audit }
    }

    /// One polling tick. Returns `Ok(())` unless a stop threshold was
    /// crossed, in which case the Supervisor should begin graceful shutdown
    /// with exit code 3 (spec §6).
    pub async fn check(&self, spend_rate_usd_per_hour: f64) -> Result<(), AutopilotError> {
        let memory_mb = self.probe.memory_used_mb();
        if memory_mb > self.config.memory_mb {
            return self.breach(format!(
                "memory usage {memory_mb}MB exceeds limit {}MB",
                self.config.memory_mb
            )).await;
        }

        let disk_pct = self.probe.disk_used_pct();
        if disk_pct >= self.config.disk_stop_pct {
            return self.breach(format!(
                "disk usage {disk_pct}% at or above stop threshold {}%",
                self.config.disk_stop_pct
            )).await;
        }
        if disk_pct >= self.config.disk_pause_pct {
            warn!(disk_pct, threshold = self.config.disk_pause_pct, "disk usage above pause threshold");
        }

        if spend_rate_usd_per_hour > self.config.max_spend_usd_per_hour {
            return self.breach(format!(
                "spend rate ${spend_rate_usd_per_hour:.2}/hr exceeds limit ${:.2}/hr",
                self.config.max_spend_usd_per_hour
            )).await;
        }

        Ok(())
    }

    async fn breach(&self, message: String) -> Result<(), AutopilotError> {
        warn!(%message, "safety breach");
        let _ = self
            .audit
            .append_audit(&AuditEvent::new(AuditEventKind::SafetyBreach, Actor::Supervisor, message.clone()))
            .await;
        Err(AutopilotError::SafetyBreach(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_test_pool, Migrator, SqliteEvidenceAuditStore, all_embedded_migrations};

    struct FixedProbe {
        memory_mb: u64,
        disk_pct: u8,
    }

    impl ResourceProbe for FixedProbe {
        fn memory_used_mb(&self) -> u64 {
            self.memory_mb
        }
        fn disk_used_pct(&self) -> u8 {
            self.disk_pct
        }
    }

    async fn audit_sink() -> Arc<dyn AuditSink> {
        let pool = create_test_pool().await.unwrap();
        Migrator::new(pool.clone()).run_embedded_migrations(all_embedded_migrations()).await.unwrap();
        Arc::new(SqliteEvidenceAuditStore::new(pool))
    }

    #[tokio::test]
    async fn memory_within_limit_passes() {
        let monitor = SafetyMonitor::new(
            SafetyConfig { memory_mb: 4096, ..SafetyConfig::default() },
            Arc::new(FixedProbe { memory_mb: 1000, disk_pct: 10 }),
            audit_sink().await,
        );
        monitor.check(0.0).await.unwrap();
    }

    #[tokio::test]
    async fn memory_over_limit_breaches() {
        let monitor = SafetyMonitor::new(
            SafetyConfig { memory_mb: 100, ..SafetyConfig::default() },
            Arc::new(FixedProbe { memory_mb: 1000, disk_pct: 10 }),
            audit_sink().await,
        );
        let err = monitor.check(0.0).await.unwrap_err();
        assert!(matches!(err, AutopilotError::SafetyBreach(_)));
    }

    #[tokio::test]
    async fn disk_at_stop_threshold_breaches() {
        let monitor = SafetyMonitor::new(
            SafetyConfig { disk_stop_pct: 90, ..SafetyConfig::default() },
            Arc::new(FixedProbe { memory_mb: 10, disk_pct: 95 }),
            audit_sink().await,
        );
        let err = monitor.check(0.0).await.unwrap_err();
        assert!(matches!(err, AutopilotError::SafetyBreach(_)));
    }
}
