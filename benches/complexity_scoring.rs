use abathur::domain::models::agent::{Agent, AgentTier};
use abathur::domain::models::phase::Phase;
use abathur::domain::models::task::{ComplexityFactors, Task};
use abathur::services::ModelRouter;
use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn complex_task() -> Task {
    let mut task = Task::new("bench task", "touches several subsystems and a public API");
    task.complexity = ComplexityFactors {
        dependency_count: 4,
        epic_membership: true,
        description_len: 420,
        ml_flag: false,
        security_flag: true,
        public_api_flag: true,
        cross_domain_flag: true,
        estimated_loc: 480,
    };
    task
}

fn bench_complexity_score(c: &mut Criterion) {
    let task = complex_task();
    c.bench_function("complexity_score_all_phases", |b| {
        b.iter(|| {
            for phase in Phase::ALL {
                black_box(task.complexity.score(phase));
            }
        });
    });
}

fn bench_select_model(c: &mut Criterion) {
    let router = ModelRouter::with_defaults();
    let task = complex_task();
    let candidates = vec![
        Agent::new("anthropic", "claude-haiku", AgentTier::Worker),
        Agent::new("anthropic", "claude-sonnet", AgentTier::Specialist),
    ];
    let now = Utc::now();
    c.bench_function("select_model", |b| {
        b.iter(|| {
            router
                .select_model(black_box(&task), AgentTier::Specialist, &candidates, now)
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_complexity_score, bench_select_model);
criterion_main!(benches);
