// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - sending `ScheduledTask`s to the executor
//! - publishing build events
//! - handling Ctrl+C / shutdown
//!
//! The core is unit tested without any Tokio, channels, filesystem, or
//! processes.

use crate::dag::Scheduler;
use crate::engine::build_run::BuildRun;
use crate::engine::event_handlers::{
    handle_run_request, handle_task_completion, handle_task_trigger, CoreStep,
};
use crate::engine::queue::TriggerQueue;
use crate::engine::{RuntimeEvent, RuntimeOptions};

/// Pure core runtime state.
///
/// This owns:
/// - the DAG scheduler
/// - the trigger queue
/// - the bookkeeping of the active run
/// - runtime options (e.g. `exit_when_idle`)
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    queue: TriggerQueue,
    current: Option<BuildRun>,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler, options: RuntimeOptions) -> Self {
        Self {
            scheduler,
            queue: TriggerQueue::new(),
            current: None,
            options,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// The run in progress, if any.
    pub fn current_run(&self) -> Option<&BuildRun> {
        self.current.as_ref()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::RunRequested { tasks } => handle_run_request(
                &mut self.scheduler,
                &mut self.queue,
                &mut self.current,
                &self.options,
                tasks,
            ),
            RuntimeEvent::TaskTriggered { task, reason } => handle_task_trigger(
                &mut self.scheduler,
                &mut self.queue,
                &mut self.current,
                task,
                reason,
            ),
            RuntimeEvent::TaskCompleted { task, outcome } => handle_task_completion(
                &mut self.scheduler,
                &mut self.queue,
                &mut self.current,
                &self.options,
                task,
                outcome,
            ),
            RuntimeEvent::ShutdownRequested => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::StageSpec;
    use crate::dag::StagePlan;
    use crate::engine::event_handlers::CoreCommand;
    use crate::engine::{TaskOutcome, TaskStatus, TriggerReason};
    use crate::events::BuildEvent;
    use std::collections::BTreeMap;

    fn core(stages: Vec<StageSpec>, names: &[&str], exit_when_idle: bool) -> CoreRuntime {
        let known: BTreeMap<String, Vec<String>> =
            names.iter().map(|n| (n.to_string(), Vec::new())).collect();
        let plan = StagePlan::resolve("build", &stages, |n: &str| {
            known.get(n).map(|v| v.as_slice())
        })
        .unwrap();
        CoreRuntime::new(Scheduler::from_plan(&plan), RuntimeOptions { exit_when_idle })
    }

    fn dispatched(step: &CoreStep) -> Vec<String> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::DispatchTasks(tasks) => Some(tasks.iter().map(|t| t.name.clone())),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn all() -> Vec<String> {
        vec!["clean".into(), "css".into(), "html".into()]
    }

    fn stages() -> Vec<StageSpec> {
        vec![
            StageSpec::Single("clean".into()),
            StageSpec::Single("css".into()),
            StageSpec::Single("html".into()),
        ]
    }

    #[test]
    fn run_request_executes_stages_and_exits() {
        let mut core = core(stages(), &["clean", "css", "html"], true);

        let step = core.step(RuntimeEvent::RunRequested { tasks: all() });
        assert_eq!(dispatched(&step), vec!["clean"]);
        assert_eq!(
            core.current_run().unwrap().status_of("html"),
            Some(&TaskStatus::Pending)
        );

        let step = core.step(RuntimeEvent::TaskCompleted {
            task: "clean".into(),
            outcome: TaskOutcome::ok(),
        });
        assert_eq!(dispatched(&step), vec!["css"]);

        core.step(RuntimeEvent::TaskCompleted {
            task: "css".into(),
            outcome: TaskOutcome::ok(),
        });
        let step = core.step(RuntimeEvent::TaskCompleted {
            task: "html".into(),
            outcome: TaskOutcome::ok(),
        });

        assert!(!step.keep_running);
        let finished = step.commands.iter().find_map(|c| match c {
            CoreCommand::RunFinished(run) => Some(run),
            _ => None,
        });
        assert!(finished.unwrap().succeeded());
    }

    #[test]
    fn failure_publishes_skips_and_fails_the_run() {
        let mut core = core(stages(), &["clean", "css", "html"], true);
        core.step(RuntimeEvent::RunRequested { tasks: all() });
        core.step(RuntimeEvent::TaskCompleted {
            task: "clean".into(),
            outcome: TaskOutcome::ok(),
        });

        let step = core.step(RuntimeEvent::TaskCompleted {
            task: "css".into(),
            outcome: TaskOutcome::Failed("bad scss".into()),
        });

        let skipped: Vec<&BuildEvent> = step
            .commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::Publish(e @ BuildEvent::TaskSkipped { .. }) => Some(e),
                _ => None,
            })
            .collect();
        assert_eq!(skipped.len(), 1);

        let run = step
            .commands
            .iter()
            .find_map(|c| match c {
                CoreCommand::RunFinished(run) => Some(run),
                _ => None,
            })
            .unwrap();
        assert!(!run.succeeded());
        assert_eq!(run.skipped_tasks(), vec!["html"]);
        assert!(!step.keep_running);
    }

    #[test]
    fn retrigger_during_run_is_queued_for_next_run() {
        let mut core = core(stages(), &["clean", "css", "html"], false);
        core.step(RuntimeEvent::RunRequested { tasks: all() });

        let step = core.step(RuntimeEvent::TaskTriggered {
            task: "css".into(),
            reason: TriggerReason::FileWatch,
        });
        assert!(dispatched(&step).is_empty());
        assert!(!core.queue_is_empty());

        core.step(RuntimeEvent::TaskCompleted {
            task: "clean".into(),
            outcome: TaskOutcome::ok(),
        });
        core.step(RuntimeEvent::TaskCompleted {
            task: "css".into(),
            outcome: TaskOutcome::ok(),
        });
        let step = core.step(RuntimeEvent::TaskCompleted {
            task: "html".into(),
            outcome: TaskOutcome::ok(),
        });

        // The queued trigger starts a new run rooted at `css`.
        assert_eq!(dispatched(&step), vec!["css"]);
        assert!(step.keep_running);
        assert!(core.queue_is_empty());
    }

    #[test]
    fn retriggers_of_concurrent_tasks_all_reach_the_next_run() {
        let stages = vec![StageSpec::Concurrent(vec!["css".into(), "js".into()])];
        let mut core = core(stages, &["css", "js"], false);
        let step = core.step(RuntimeEvent::RunRequested {
            tasks: vec!["css".into(), "js".into()],
        });
        assert_eq!(dispatched(&step), vec!["css", "js"]);

        for task in ["css", "js"] {
            core.step(RuntimeEvent::TaskTriggered {
                task: task.into(),
                reason: TriggerReason::FileWatch,
            });
        }
        core.step(RuntimeEvent::TaskCompleted {
            task: "css".into(),
            outcome: TaskOutcome::ok(),
        });
        let step = core.step(RuntimeEvent::TaskCompleted {
            task: "js".into(),
            outcome: TaskOutcome::ok(),
        });

        assert_eq!(dispatched(&step), vec!["css", "js"]);
        assert!(core.queue_is_empty());
    }

    #[test]
    fn empty_run_request_exits_when_idle() {
        let mut core = core(stages(), &["clean", "css", "html"], true);
        let step = core.step(RuntimeEvent::RunRequested { tasks: Vec::new() });

        assert!(dispatched(&step).is_empty());
        assert!(!step.keep_running);
        assert!(step
            .commands
            .iter()
            .any(|c| matches!(c, CoreCommand::RequestExit)));
    }

    #[test]
    fn shutdown_stops_the_loop() {
        let mut core = core(stages(), &["clean", "css", "html"], false);
        let step = core.step(RuntimeEvent::ShutdownRequested);
        assert!(!step.keep_running);
    }
}
