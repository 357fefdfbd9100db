//! `autopilot validate` — load the roadmap and check dependency and
//! evidence-bundle invariants without starting the supervisor (spec §6).

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::adapters::sqlite::{initialize_default_database, SqliteEvidenceAuditStore, SqliteTaskRepository};
use crate::domain::models::config::Config;
use crate::domain::models::Phase;
use crate::domain::ports::{EvidenceStore, TaskRepository};
use crate::services::dependency_resolver::DependencyResolver;

pub async fn handle_validate(config: &Config) -> Result<i32> {
    let state_root = std::path::Path::new(&config.state_root);
    let pool = initialize_default_database(state_root).await.context("initialize database")?;
    let task_repo = SqliteTaskRepository::new(pool.clone());
    let evidence: Arc<dyn EvidenceStore> = Arc::new(SqliteEvidenceAuditStore::new(pool));

    let tasks = task_repo.load_roadmap().await.context("load roadmap")?;
    let mut violations = Vec::new();

    let resolver = DependencyResolver::new();
    if let Some(cycle) = resolver.detect_cycle(&tasks) {
        violations.push(format!("dependency cycle: {cycle:?}"));
    }
    for task in &tasks {
        if let Err(e) = resolver.validate_dependencies(task, &tasks) {
            violations.push(format!("task {}: {e}", task.id));
        }
    }

    for task in &tasks {
        for phase in Phase::ALL {
            if task.attempts_for(phase).counted > 0 {
                let bundle = evidence.read_evidence(task.id, Some(phase)).await?;
                let missing = bundle.missing(phase.required_artifacts());
                if !missing.is_empty() {
                    violations.push(format!(
                        "task {} phase {phase}: missing evidence {missing:?}",
                        task.id
                    ));
                }
            }
        }
    }

    if violations.is_empty() {
        println!("roadmap valid: {} tasks", tasks.len());
        Ok(0)
    } else {
        for v in &violations {
            println!("VIOLATION: {v}");
        }
        Ok(1)
    }
}
