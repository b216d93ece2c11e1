// src/dag/graph.rs

use std::collections::HashMap;

use crate::dag::plan::StagePlan;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    /// Direct dependencies: tasks that must succeed before this one can run.
    deps: Vec<String>,
    /// Direct dependents: tasks that depend on this one.
    dependents: Vec<String>,
}

/// In-memory adjacency lists keyed by task name.
///
/// Acyclicity is checked when the [`StagePlan`] is resolved; here we only keep
/// what the scheduler needs to walk the graph in both directions.
#[derive(Debug, Clone)]
pub struct DagGraph {
    nodes: HashMap<String, DagNode>,
}

impl DagGraph {
    pub fn from_plan(plan: &StagePlan) -> Self {
        let mut nodes: HashMap<String, DagNode> = plan
            .tasks()
            .map(|task| {
                (
                    task.name.clone(),
                    DagNode {
                        deps: task.deps.clone(),
                        dependents: Vec::new(),
                    },
                )
            })
            .collect();

        for task in plan.tasks() {
            for dep in &task.deps {
                if let Some(dep_node) = nodes.get_mut(dep) {
                    dep_node.dependents.push(task.name.clone());
                }
            }
        }

        for node in nodes.values_mut() {
            node.dependents.sort();
        }

        Self { nodes }
    }

    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }
}
