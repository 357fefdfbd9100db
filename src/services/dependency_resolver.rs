//! Dependency graph helpers for the Scheduler and Roadmap loader: cycle
//! detection, topological ordering, and dependency-depth calculation.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::domain::errors::AutopilotError;
use crate::domain::models::Task;

#[derive(Debug, Clone, Default)]
pub struct DependencyResolver;

fn detect_cycle_util(
    node: Uuid,
    graph: &HashMap<Uuid, Vec<Uuid>>,
    visited: &mut HashSet<Uuid>,
    rec_stack: &mut HashSet<Uuid>,
    path: &mut Vec<Uuid>,
) -> bool {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    if let Some(neighbors) = graph.get(&node) {
        for &neighbor in neighbors {
            if !visited.contains(&neighbor) {
                if detect_cycle_util(neighbor, graph, visited, rec_stack, path) {
                    return true;
                }
            } else if rec_stack.contains(&neighbor) {
                if let Some(cycle_start) = path.iter().position(|&id| id == neighbor) {
                    path.drain(0..cycle_start);
                    return true;
                }
            }
        }
    }

    rec_stack.remove(&node);
    path.pop();
    false
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Every id in `task.dependencies` must name a task in `available_tasks`.
    pub fn validate_dependencies(&self, task: &Task, available_tasks: &[Task]) -> Result<(), AutopilotError> {
        let available_ids: HashSet<Uuid> = available_tasks.iter().map(|t| t.id).collect();
        for dep_id in &task.dependencies {
            if !available_ids.contains(dep_id) && *dep_id != task.id {
                return Err(AutopilotError::ValidationFailed(format!(
                    "dependency task {dep_id} not found"
                )));
            }
        }
        Ok(())
    }

    /// Detect a circular dependency among `tasks`, returning the cycle's
    /// task ids if one exists.
    pub fn detect_cycle(&self, tasks: &[Task]) -> Option<Vec<Uuid>> {
        let mut graph: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for task in tasks {
            graph.entry(task.id).or_default().extend(task.dependencies.iter().copied());
        }

        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for task_id in graph.keys() {
            if !visited.contains(task_id)
                && detect_cycle_util(*task_id, &graph, &mut visited, &mut rec_stack, &mut path)
            {
                return Some(path);
            }
        }
        None
    }

    /// Dependencies-before-dependents ordering via Kahn's algorithm.
    pub fn topological_sort(&self, tasks: &[Task]) -> Result<Vec<Task>, AutopilotError> {
        if let Some(cycle) = self.detect_cycle(tasks) {
            return Err(AutopilotError::DependencyCycle(
                cycle.first().copied().unwrap_or_default(),
            ));
        }

        let mut task_map: HashMap<Uuid, Task> = tasks.iter().map(|t| (t.id, t.clone())).collect();
        let mut in_degree: HashMap<Uuid, usize> = HashMap::new();
        let mut graph: HashMap<Uuid, Vec<Uuid>> = HashMap::new();

        for task in tasks {
            in_degree.entry(task.id).or_insert(0);
            for &dep_id in &task.dependencies {
                graph.entry(dep_id).or_default().push(task.id);
                *in_degree.entry(task.id).or_insert(0) += 1;
            }
        }

        let mut queue: Vec<Uuid> = in_degree
            .iter()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut sorted = Vec::new();
        while let Some(node_id) = queue.pop() {
            if let Some(task) = task_map.remove(&node_id) {
                sorted.push(task);
            }
            if let Some(neighbors) = graph.get(&node_id) {
                for &neighbor in neighbors {
                    if let Some(degree) = in_degree.get_mut(&neighbor) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push(neighbor);
                        }
                    }
                }
            }
        }

        if sorted.len() != tasks.len() {
            return Err(AutopilotError::Integrity(
                "topological sort failed: disconnected dependency graph".into(),
            ));
        }
        Ok(sorted)
    }

    /// Maximum depth of `task`'s dependency chain, for the priority
    /// calculator's staleness/complexity inputs.
    pub fn calculate_depth(&self, task: &Task, all_tasks: &[Task]) -> Result<u32, AutopilotError> {
        let task_map: HashMap<Uuid, &Task> = all_tasks.iter().map(|t| (t.id, t)).collect();
        let mut visited = HashSet::new();
        calculate_depth_recursive(task, &task_map, &mut visited)
    }
}

fn calculate_depth_recursive(
    task: &Task,
    task_map: &HashMap<Uuid, &Task>,
    visited: &mut HashSet<Uuid>,
) -> Result<u32, AutopilotError> {
    if visited.contains(&task.id) {
        return Err(AutopilotError::DependencyCycle(task.id));
    }
    visited.insert(task.id);

    let mut depths = Vec::new();
    for &dep_id in &task.dependencies {
        if let Some(&dep_task) = task_map.get(&dep_id) {
            depths.push(calculate_depth_recursive(dep_task, task_map, visited)?);
        }
    }
    let max_depth = depths.into_iter().max().map_or(0, |d| d + 1);

    visited.remove(&task.id);
    Ok(max_depth)
}
