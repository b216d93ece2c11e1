// src/watch/dag_filter.rs

//! DAG-aware filtering logic for watch events.

use std::collections::{BTreeSet, HashSet};

use crate::dag::DagGraph;

/// Return true if `task` has any ancestor whose name is in `matching`.
///
/// Ancestors are followed transitively through the graph's dependency
/// lists.
pub fn has_ancestor_in_matching(task: &str, matching: &BTreeSet<String>, graph: &DagGraph) -> bool {
    let mut stack: Vec<&str> = graph.dependencies_of(task).iter().map(String::as_str).collect();
    let mut visited: HashSet<&str> = HashSet::new();

    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        if matching.contains(current) {
            return true;
        }
        stack.extend(graph.dependencies_of(current).iter().map(String::as_str));
    }

    false
}

/// The tasks of `matching` that should actually be triggered: those with
/// no ancestor that also matched. Their dependents follow through the
/// scheduler.
pub fn trigger_roots(matching: &BTreeSet<String>, graph: &DagGraph) -> Vec<String> {
    matching
        .iter()
        .filter(|task| !has_ancestor_in_matching(task, matching, graph))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::config::model::TaskConfig;
    use crate::dag::StagePlan;
    use crate::types::UnitKind;

    fn graph(edges: &[(&str, &[&str])]) -> DagGraph {
        let tasks: BTreeMap<String, TaskConfig> = edges
            .iter()
            .map(|(name, after)| {
                let mut cfg = TaskConfig::of_kind(UnitKind::Copy);
                cfg.after = after.iter().map(|s| s.to_string()).collect();
                (name.to_string(), cfg)
            })
            .collect();
        DagGraph::from_plan(&StagePlan::from_dependencies(&tasks).unwrap())
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn transitive_ancestor_suppresses_descendant() {
        let g = graph(&[("templates", &[]), ("pages", &["templates"]), ("sitemap", &["pages"])]);
        let matching = set(&["templates", "sitemap"]);

        assert!(has_ancestor_in_matching("sitemap", &matching, &g));
        assert_eq!(trigger_roots(&matching, &g), vec!["templates".to_string()]);
    }

    #[test]
    fn unrelated_matches_are_all_triggered() {
        let g = graph(&[("css", &[]), ("images", &[])]);
        let matching = set(&["css", "images"]);

        assert_eq!(
            trigger_roots(&matching, &g),
            vec!["css".to_string(), "images".to_string()]
        );
    }
}
