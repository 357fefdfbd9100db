//! `autopilot gate <task>` — run the Quality Gate off-line against an
//! existing evidence bundle, without a live substrate (spec §6).

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use uuid::Uuid;

use crate::adapters::sqlite::{initialize_default_database, SqliteEvidenceAuditStore, SqliteTaskRepository};
use crate::domain::models::config::Config;
use crate::domain::ports::{AuditSink, Critic, EvidenceStore, TaskRepository};
use crate::services::critics::{
    BuildCritic, LintCritic, ProcessCritic, ReasoningCritic, SecurityScanCritic, StructuralCritic, TestSuiteCritic,
};
use crate::services::quality_gate::{QualityGate, QualityGateConfig};

pub async fn handle_gate(config: &Config, task_id: Uuid) -> Result<i32> {
    let state_root = std::path::Path::new(&config.state_root);
    let pool = initialize_default_database(state_root).await.context("initialize database")?;
    let task_repo = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let evidence: Arc<dyn EvidenceStore> = Arc::new(SqliteEvidenceAuditStore::new(pool.clone()));
    let audit: Arc<dyn AuditSink> = Arc::new(SqliteEvidenceAuditStore::new(pool));

    let Some(task) = task_repo.get(task_id).await? else {
        bail!("task {task_id} not found");
    };

    let critics: Vec<Arc<dyn Critic>> = vec![
        Arc::new(BuildCritic::new(evidence.clone())),
        Arc::new(LintCritic::new(evidence.clone())),
        Arc::new(StructuralCritic::new(evidence.clone())),
        Arc::new(ReasoningCritic::new(evidence.clone())),
        Arc::new(TestSuiteCritic::new(evidence.clone())),
        Arc::new(SecurityScanCritic::new(evidence.clone())),
        Arc::new(ProcessCritic),
    ];
    let gate = QualityGate::new(
        critics,
        task_repo,
        audit,
        evidence.clone(),
        QualityGateConfig {
            enable_quality_graph: config.enable_quality_graph,
            disable_peer_review: config.disable_peer_review,
            ..QualityGateConfig::default()
        },
    );

    let bundle = evidence.read_evidence(task.id, Some(task.current_phase)).await?;
    let decision = gate
        .post_phase_validation(&task, task.current_phase, &bundle, std::time::Duration::ZERO)
        .await?;

    println!(
        "quality score: {:.2} blocking: {} bypasses: {:?}",
        decision.node.overall(),
        decision.blocking,
        decision.confirmed_bypasses
    );

    Ok(if decision.blocking { 1 } else { 0 })
}
