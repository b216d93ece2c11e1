use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use sitedag::config::TaskConfig;
use sitedag::dag::{Scheduler, StagePlan};
use sitedag::engine::{
    CoreCommand, CoreRuntime, RuntimeEvent, RuntimeOptions, TaskOutcome, TaskStatus,
};
use sitedag::types::UnitKind;

// Task N may only depend on tasks 0..N, so every generated graph is acyclic.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = BTreeMap<String, TaskConfig>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(|raw_deps| {
            raw_deps
                .into_iter()
                .enumerate()
                .map(|(i, potential)| {
                    let mut task = TaskConfig::of_kind(UnitKind::Command);
                    task.cmd = Some(format!("echo task_{i}"));
                    if i > 0 {
                        let deps: BTreeSet<usize> = potential.into_iter().map(|d| d % i).collect();
                        task.after = deps.into_iter().map(|d| format!("task_{d}")).collect();
                    }
                    (format!("task_{i}"), task)
                })
                .collect()
        })
    })
}

fn dispatched(commands: &[CoreCommand]) -> Vec<String> {
    commands
        .iter()
        .filter_map(|c| match c {
            CoreCommand::DispatchTasks(tasks) => Some(tasks.iter().map(|t| t.name.clone())),
            _ => None,
        })
        .flatten()
        .collect()
}

proptest! {
    #[test]
    fn every_run_terminates_and_respects_after_edges(
        tasks in dag_strategy(10),
        failing in proptest::collection::btree_set(0..10usize, 0..3),
        picks in proptest::collection::vec(any::<usize>(), 64),
    ) {
        let plan = StagePlan::from_dependencies(&tasks).unwrap();
        let mut core = CoreRuntime::new(
            Scheduler::from_plan(&plan),
            RuntimeOptions { exit_when_idle: true },
        );
        let failing: BTreeSet<String> = failing.iter().map(|i| format!("task_{i}")).collect();

        let step = core.step(RuntimeEvent::RunRequested {
            tasks: tasks.keys().cloned().collect(),
        });
        let mut running = dispatched(&step.commands);
        let mut succeeded: BTreeSet<String> = BTreeSet::new();
        let mut finished_run = None;
        let mut pick = picks.iter().cycle();

        while !running.is_empty() {
            let index = pick.next().copied().unwrap_or(0) % running.len();
            let task = running.swap_remove(index);
            let outcome = if failing.contains(&task) {
                TaskOutcome::Failed("boom".into())
            } else {
                succeeded.insert(task.clone());
                TaskOutcome::ok()
            };

            let step = core.step(RuntimeEvent::TaskCompleted { task, outcome });
            for name in dispatched(&step.commands) {
                for dep in &tasks[&name].after {
                    prop_assert!(succeeded.contains(dep), "{name} dispatched before {dep}");
                }
                running.push(name);
            }
            for command in step.commands {
                if let CoreCommand::RunFinished(run) = command {
                    finished_run = Some(run);
                }
            }
        }

        prop_assert!(core.is_idle(), "scheduler stuck with nothing running");
        let run = finished_run.expect("run never finished");
        for (name, status) in run.tasks() {
            prop_assert!(status.is_terminal(), "{name} left in {status}");
            if let TaskStatus::Skipped = status {
                prop_assert!(!succeeded.contains(name));
            }
        }
        prop_assert_eq!(run.succeeded(), failing.iter().all(|f| !tasks.contains_key(f)));
    }
}
