use abathur::domain::models::task::Task;
use abathur::services::DependencyResolver;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use uuid::Uuid;

/// A linear chain of `n` tasks, each depending on the one before it — the
/// worst case for topological sort's queue churn.
fn chain(n: usize) -> Vec<Task> {
    let ids: Vec<Uuid> = (0..n).map(|_| Uuid::new_v4()).collect();
    ids.iter()
        .enumerate()
        .map(|(i, &id)| {
            let mut task = Task::new(format!("task-{i}"), "bench task");
            task.id = id;
            if i > 0 {
                task.dependencies.push(ids[i - 1]);
            }
            task
        })
        .collect()
}

fn bench_topological_sort(c: &mut Criterion) {
    let resolver = DependencyResolver::new();
    let mut group = c.benchmark_group("topological_sort");
    for size in [10usize, 100, 1_000] {
        let tasks = chain(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &tasks, |b, tasks| {
            b.iter(|| resolver.topological_sort(black_box(tasks)).unwrap());
        });
    }
    group.finish();
}

fn bench_detect_cycle(c: &mut Criterion) {
    let resolver = DependencyResolver::new();
    let mut group = c.benchmark_group("detect_cycle");
    for size in [10usize, 100, 1_000] {
        let tasks = chain(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &tasks, |b, tasks| {
            b.iter(|| resolver.detect_cycle(black_box(tasks)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_topological_sort, bench_detect_cycle);
criterion_main!(benches);
