//! Property tests for the quantified invariants that hold across every
//! task, not just the scenarios in `scenarios_test.rs`: phase ordering,
//! dependency-respecting topological order, the WIP cap, audit
//! append-only ordering, and model-router tier monotonicity.

use std::collections::HashSet;
use std::sync::Arc;

use abathur::domain::models::agent::{Agent, AgentTier};
use abathur::domain::models::audit::{Actor, AuditEvent, AuditEventKind};
use abathur::domain::models::phase::Phase;
use abathur::domain::models::task::{ComplexityFactors, ComplexityTier, Task};
use abathur::domain::ports::{AuditFilter, AuditSink};
use abathur::services::{DependencyResolver, ModelRouter, WipController};
use chrono::Utc;
use proptest::prelude::*;
use uuid::Uuid;

/// A linear chain `task[i]` depends on `task[i-1]`, in shuffled input
/// order, so `topological_sort` can't pass by accident of input ordering.
fn chain_in_order(ids: &[usize], order: &[usize]) -> Vec<Task> {
    let uuids: Vec<Uuid> = ids.iter().map(|_| Uuid::new_v4()).collect();
    let tasks: Vec<Task> = ids
        .iter()
        .map(|&i| {
            let mut task = Task::new(format!("task-{i}"), "dependency-ordered task");
            task.id = uuids[i];
            if i > 0 {
                task.dependencies.push(uuids[i - 1]);
            }
            task
        })
        .collect();
    // Reorder the slice per `order` without touching the dependency edges,
    // so the sort result is exercised independent of input order.
    order.iter().map(|&idx| tasks[idx].clone()).collect()
}

proptest! {
    /// Invariant 4 (dependency order respected): whatever order a chain of
    /// tasks is handed to `topological_sort` in, every dependency appears
    /// before its dependent in the output.
    #[test]
    fn topological_sort_always_orders_dependencies_before_dependents(
        len in 2usize..12,
        seed in 0u64..10_000,
    ) {
        let ids: Vec<usize> = (0..len).collect();
        let mut order: Vec<usize> = ids.clone();
        // Deterministic pseudo-shuffle from `seed`, since proptest can't use
        // `rand` directly inside the generated closure's body here.
        for i in (1..order.len()).rev() {
            let j = (seed as usize).wrapping_mul(2654435761).wrapping_add(i) % (i + 1);
            order.swap(i, j);
        }
        let tasks = chain_in_order(&ids, &order);

        let resolver = DependencyResolver::new();
        let sorted = resolver.topological_sort(&tasks).expect("acyclic chain must sort");

        let position: std::collections::HashMap<Uuid, usize> =
            sorted.iter().enumerate().map(|(i, t)| (t.id, i)).collect();
        for task in &sorted {
            for dep in &task.dependencies {
                prop_assert!(
                    position[dep] < position[&task.id],
                    "dependency {} must precede dependent {}", dep, task.id
                );
            }
        }
    }

    /// Invariant 3 (WIP cap never exceeded): across any sequence of
    /// reserve/release calls spread over any number of workers, the number
    /// of concurrently held slots never exceeds the configured global cap.
    #[test]
    fn wip_reservations_never_exceed_global_cap(
        global_cap in 1u32..6,
        per_worker_cap in 1u32..4,
        attempts in 0usize..40,
        worker_count in 1usize..4,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let wip = WipController::new(global_cap, per_worker_cap);
            let mut held = Vec::new();
            for i in 0..attempts {
                let worker = format!("worker-{}", i % worker_count);
                let task_id = Uuid::new_v4();
                if wip.reserve(task_id, worker).await {
                    held.push(task_id);
                }
                if i % 3 == 0 {
                    if let Some(id) = held.pop() {
                        wip.release(id).await;
                    }
                }
                prop_assert!(held.len() as u32 <= global_cap);
            }
            Ok(())
        })?;
    }

    /// Invariant: a single task_id reservation is idempotent — calling
    /// `reserve` twice for the same task never grants a second slot.
    #[test]
    fn wip_duplicate_reserve_is_never_double_counted(global_cap in 1u32..6) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let wip = WipController::new(global_cap, global_cap);
            let task_id = Uuid::new_v4();
            let first = wip.reserve(task_id, "w1").await;
            let second = wip.reserve(task_id, "w1").await;
            prop_assert!(first);
            prop_assert!(!second);
            Ok(())
        })?;
    }

    /// Invariant 1 (phase ordering is fixed and total): for any
    /// `gate_required` flag, `sequence_for` always starts at `Strategize`,
    /// ends at `Monitor`, and never repeats a phase.
    #[test]
    fn phase_sequence_is_a_total_order_from_strategize_to_monitor(gate_required in any::<bool>()) {
        let seq = Phase::sequence_for(gate_required);
        prop_assert_eq!(seq.first().copied(), Some(Phase::Strategize));
        prop_assert_eq!(seq.last().copied(), Some(Phase::Monitor));
        let unique: HashSet<_> = seq.iter().collect();
        prop_assert_eq!(unique.len(), seq.len());
        prop_assert_eq!(seq.contains(&Phase::Gate), gate_required);
    }

    /// Invariant 7 (router only selects eligible candidates): whatever
    /// model the router picks, the winning agent's `model` field equals the
    /// returned selection's `model`, and it was available at decision time.
    #[test]
    fn model_router_never_selects_an_unavailable_agent(
        dependency_count in 0u32..6,
        description_len in 0u32..800,
        estimated_loc in 0u32..500,
    ) {
        let router = ModelRouter::with_defaults();
        let mut task = Task::new("T", "property task");
        task.complexity = ComplexityFactors {
            dependency_count,
            epic_membership: false,
            description_len,
            ml_flag: false,
            security_flag: false,
            public_api_flag: false,
            cross_domain_flag: false,
            estimated_loc,
        };

        let candidates = vec![
            Agent::new("anthropic", "claude-haiku-4-5", AgentTier::Worker),
            Agent::new("anthropic", "claude-sonnet-4-5", AgentTier::Worker),
            Agent::new("anthropic", "claude-opus-4-1", AgentTier::Architect),
        ];
        let now = Utc::now();

        if let Ok(selection) = router.select_model(&task, AgentTier::Worker, &candidates, now) {
            let winner = candidates.iter().find(|a| a.model == selection.model);
            prop_assert!(winner.is_some(), "selected model must match a candidate agent");
            prop_assert!(winner.unwrap().is_available(now));
        }
    }

    /// Complexity scoring is monotonic in its inputs: adding a risk flag or
    /// more dependencies never lowers the resulting tier.
    #[test]
    fn complexity_tier_is_monotonic_in_risk_flags(
        dependency_count in 0u32..6,
        description_len in 0u32..800,
        estimated_loc in 0u32..500,
    ) {
        let base = ComplexityFactors {
            dependency_count,
            epic_membership: false,
            description_len,
            ml_flag: false,
            security_flag: false,
            public_api_flag: false,
            cross_domain_flag: false,
            estimated_loc,
        };
        let riskier = ComplexityFactors { security_flag: true, ..base };

        let base_tier = ComplexityTier::from_score(base.score(Phase::Implement));
        let riskier_tier = ComplexityTier::from_score(riskier.score(Phase::Implement));
        prop_assert!(riskier_tier >= base_tier);
    }
}

/// Invariant 5 (audit trail is append-only and ordered): events queried
/// back out come in the order they were appended, and appending never
/// mutates or drops an earlier event.
#[tokio::test]
async fn audit_events_are_returned_in_append_order() {
    use abathur::adapters::sqlite::{create_migrated_test_pool, SqliteEvidenceAuditStore};

    let pool = create_migrated_test_pool().await.expect("create test pool");
    let sink: Arc<dyn AuditSink> = Arc::new(SqliteEvidenceAuditStore::new(pool));

    let task_id = Uuid::new_v4();
    let mut appended = Vec::new();
    for i in 0..20 {
        let mut event = AuditEvent::new(AuditEventKind::PhaseTransition, Actor::Supervisor, format!("step {i}"));
        event.task_id = Some(task_id);
        sink.append_audit(&event).await.expect("append audit event");
        appended.push(event.id);
    }

    let all = sink
        .query_audit(AuditFilter { task_id: Some(task_id), since: None, limit: None })
        .await
        .expect("query audit events");

    assert_eq!(all.len(), appended.len());
    let returned_ids: Vec<Uuid> = all.iter().map(|e| e.id).collect();
    assert_eq!(returned_ids, appended, "audit events must come back in the order they were appended");
}
