// src/dag/plan.rs

//! Resolution of a stage sequence into a dependency graph.
//!
//! A pipeline is an ordered list of stages. Every task of stage `n + 1`
//! depends on every task of stage `n`, and each task additionally depends on
//! the tasks listed in its `after`. Tasks reached only through `after` are
//! pulled into the plan without a stage of their own.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{StageSpec, TaskConfig};
use crate::engine::TaskName;
use crate::errors::{Result, SitedagError};

/// How a task shares its stage with other tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyClass {
    /// The only task of its stage.
    Exclusive,
    /// Runs alongside the other tasks of its stage (or alongside whatever is
    /// ready, for tasks without a stage).
    FanOutPeer,
}

impl ConcurrencyClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConcurrencyClass::Exclusive => "exclusive",
            ConcurrencyClass::FanOutPeer => "fan-out",
        }
    }
}

/// One task of a resolved plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTask {
    pub name: TaskName,
    /// Zero-based stage index, `None` for tasks pulled in through `after`.
    pub stage: Option<usize>,
    pub class: ConcurrencyClass,
    /// Direct dependencies, stage barrier first, then `after`.
    pub deps: Vec<TaskName>,
}

/// A validated, acyclic execution plan.
#[derive(Debug, Clone)]
pub struct StagePlan {
    name: String,
    stages: Vec<Vec<TaskName>>,
    tasks: BTreeMap<TaskName, PlannedTask>,
}

impl StagePlan {
    /// Resolve `stages` against the known tasks.
    ///
    /// `deps_of` returns the `after` list of a task, or `None` if no task by
    /// that name exists.
    pub fn resolve<'a, F>(name: &str, stages: &[StageSpec], deps_of: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<&'a [String]>,
    {
        if stages.is_empty() {
            return Err(SitedagError::ConfigError(format!(
                "pipeline '{name}' has no stages"
            )));
        }

        let mut resolved_stages: Vec<Vec<TaskName>> = Vec::with_capacity(stages.len());
        let mut tasks: BTreeMap<TaskName, PlannedTask> = BTreeMap::new();

        for (index, stage) in stages.iter().enumerate() {
            let names = stage.names();
            if names.is_empty() {
                return Err(SitedagError::ConfigError(format!(
                    "stage {} is empty",
                    index + 1
                )));
            }

            let class = if names.len() == 1 {
                ConcurrencyClass::Exclusive
            } else {
                ConcurrencyClass::FanOutPeer
            };

            let barrier: Vec<TaskName> = resolved_stages.last().cloned().unwrap_or_default();
            let mut this_stage = Vec::with_capacity(names.len());

            for task in names {
                let Some(after) = deps_of(task) else {
                    return Err(SitedagError::TaskNotFound(format!(
                        "unknown task '{task}' in stage {}",
                        index + 1
                    )));
                };
                if tasks.contains_key(task) {
                    return Err(SitedagError::ConfigError(format!(
                        "task '{task}' appears more than once"
                    )));
                }

                let mut deps = barrier.clone();
                for dep in after {
                    if !deps.contains(dep) {
                        deps.push(dep.clone());
                    }
                }

                tasks.insert(
                    task.to_string(),
                    PlannedTask {
                        name: task.to_string(),
                        stage: Some(index),
                        class,
                        deps,
                    },
                );
                this_stage.push(task.to_string());
            }

            resolved_stages.push(this_stage);
        }

        // Pull in `after` dependencies that have no stage of their own.
        let mut pending: Vec<TaskName> = tasks
            .values()
            .flat_map(|t| t.deps.iter().cloned())
            .collect();
        while let Some(dep) = pending.pop() {
            if tasks.contains_key(&dep) {
                continue;
            }
            let Some(after) = deps_of(&dep) else {
                return Err(SitedagError::TaskNotFound(format!(
                    "unknown task '{dep}' in `after`"
                )));
            };
            pending.extend(after.iter().cloned());
            tasks.insert(
                dep.clone(),
                PlannedTask {
                    name: dep,
                    stage: None,
                    class: ConcurrencyClass::FanOutPeer,
                    deps: after.to_vec(),
                },
            );
        }

        let plan = Self {
            name: name.to_string(),
            stages: resolved_stages,
            tasks,
        };
        plan.ensure_acyclic()?;
        Ok(plan)
    }

    /// Plan over every configured task, ordered only by `after`.
    ///
    /// Used by the watch layer, where each change triggers one task and its
    /// dependents rather than a whole pipeline.
    pub fn from_dependencies(tasks: &BTreeMap<String, TaskConfig>) -> Result<Self> {
        let planned = tasks
            .iter()
            .map(|(name, cfg)| {
                (
                    name.clone(),
                    PlannedTask {
                        name: name.clone(),
                        stage: None,
                        class: ConcurrencyClass::FanOutPeer,
                        deps: cfg.after.clone(),
                    },
                )
            })
            .collect();

        let plan = Self {
            name: "watch".to_string(),
            stages: Vec::new(),
            tasks: planned,
        };
        plan.ensure_acyclic()?;
        Ok(plan)
    }

    fn ensure_acyclic(&self) -> Result<()> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for task in self.tasks.values() {
            graph.add_node(task.name.as_str());
            for dep in &task.deps {
                graph.add_edge(dep.as_str(), task.name.as_str(), ());
            }
        }

        toposort(&graph, None).map(|_| ()).map_err(|cycle| {
            SitedagError::DagCycle(format!(
                "cycle detected in pipeline '{}' involving task '{}'",
                self.name,
                cycle.node_id()
            ))
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> &[Vec<TaskName>] {
        &self.stages
    }

    pub fn tasks(&self) -> impl Iterator<Item = &PlannedTask> {
        self.tasks.values()
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|s| s.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&PlannedTask> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks with no dependencies inside the plan.
    pub fn roots(&self) -> Vec<TaskName> {
        self.tasks
            .values()
            .filter(|t| t.deps.is_empty())
            .map(|t| t.name.clone())
            .collect()
    }

    /// Human-readable description used by `--dry-run`.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "pipeline '{}':", self.name);

        let mut staged: BTreeSet<&str> = BTreeSet::new();
        for (index, stage) in self.stages.iter().enumerate() {
            let _ = writeln!(out, "  stage {}:", index + 1);
            for name in stage {
                staged.insert(name);
                if let Some(task) = self.tasks.get(name) {
                    let _ = writeln!(out, "    - {} ({})", name, task.class.as_str());
                }
            }
        }

        let loose: Vec<&PlannedTask> = self
            .tasks
            .values()
            .filter(|t| !staged.contains(t.name.as_str()))
            .collect();
        if !loose.is_empty() {
            let _ = writeln!(out, "  dependencies:");
            for task in loose {
                if task.deps.is_empty() {
                    let _ = writeln!(out, "    - {}", task.name);
                } else {
                    let _ = writeln!(out, "    - {} (after {})", task.name, task.deps.join(", "));
                }
            }
        }

        out
    }
}
