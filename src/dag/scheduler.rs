// src/dag/scheduler.rs

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::graph::DagGraph;
use crate::dag::plan::StagePlan;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::StateManager;
use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo, TaskRunState};
use crate::engine::{TaskName, TaskOutcome};

/// Scheduler holds the immutable DAG plus mutable per-run state.
///
/// It is responsible for:
/// - remembering which tasks are part of the current run
/// - deciding when a triggered task is ready to run (deps satisfied)
/// - recording outcomes and scheduling dependents
/// - skipping dependents when a task fails
#[derive(Debug)]
pub struct Scheduler {
    graph: DagGraph,
    tasks: HashMap<TaskName, TaskInfo>,
    /// Monotonically increasing run ID.
    run_counter: u64,
    /// Currently active run ID, or `None` if there is no active run.
    current_run_id: Option<u64>,
}

impl Scheduler {
    pub fn from_plan(plan: &StagePlan) -> Self {
        let graph = DagGraph::from_plan(plan);
        let tasks = plan
            .tasks()
            .map(|task| {
                (
                    task.name.clone(),
                    TaskInfo::new(task.name.clone(), task.deps.clone()),
                )
            })
            .collect();

        Self {
            graph,
            tasks,
            run_counter: 0,
            current_run_id: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    pub fn current_run_id(&self) -> Option<u64> {
        self.current_run_id
    }

    pub fn contains(&self, task: &str) -> bool {
        self.tasks.contains_key(task)
    }

    /// Read-only view of the given task's run state.
    pub fn run_state_of(&self, task: &str) -> Option<TaskRunState> {
        let info = self.tasks.get(task)?;
        Some(info.run_state.into())
    }

    /// Names of tasks participating in the active run, sorted.
    pub fn tasks_in_current_run(&self) -> Vec<TaskName> {
        if self.current_run_id.is_none() {
            return Vec::new();
        }

        let mut names: Vec<TaskName> = self
            .tasks
            .values()
            .filter(|info| info.run_state.is_some())
            .map(|info| info.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Start a new run, resetting per-run state but keeping history.
    pub fn start_new_run(&mut self) -> u64 {
        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);

        for info in self.tasks.values_mut() {
            info.run_state = None;
        }

        debug!(run_id = self.run_counter, "scheduler: starting new DAG run");
        self.run_counter
    }

    pub fn handle_trigger(&mut self, task: &str) -> Vec<ScheduledTask> {
        self.step_trigger(task).newly_scheduled
    }

    /// Add `task` and its dependents to the current run (starting one if
    /// idle) and report what became ready.
    pub fn step_trigger(&mut self, task: &str) -> SchedulerStep {
        if self.current_run_id.is_none() {
            warn!(
                task = %task,
                "trigger with no active run; implicitly starting a new run"
            );
            self.start_new_run();
        }

        if self.tasks.contains_key(task) {
            let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
            manager.mark_task_and_dependents_pending(task);
        } else {
            warn!(task = %task, "trigger for unknown task; ignoring");
        }

        let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        let newly_scheduled = manager.collect_new_ready_tasks();
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            run_just_finished,
            ..SchedulerStep::default()
        }
    }

    /// Record a task outcome. Success schedules ready dependents; failure
    /// skips every pending dependent.
    pub fn step_completion(&mut self, task: &str, outcome: &TaskOutcome) -> SchedulerStep {
        let Some(run_id) = self.current_run_id else {
            warn!(task = %task, "completion with no active run; ignoring");
            return SchedulerStep::default();
        };

        let mut step = SchedulerStep::default();

        let Some(info) = self.tasks.get_mut(task) else {
            warn!(task = %task, "completion for unknown task; ignoring");
            return step;
        };

        if info.run_state != Some(RunState::Running) {
            warn!(
                task = %task,
                state = ?info.run_state,
                "completion for a task that is not running; ignoring"
            );
            return step;
        }

        match outcome {
            TaskOutcome::Success { .. } => {
                info.run_state = Some(RunState::DoneSuccess);
                info.last_successful_run = Some(run_id);
                debug!(task = %info.name, run_id, "task completed successfully");
                let mut manager =
                    StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
                step.newly_scheduled = manager.collect_new_ready_tasks();
            }
            TaskOutcome::Failed(reason) => {
                info.run_state = Some(RunState::DoneFailed);
                info.last_failed_run = Some(run_id);
                warn!(
                    task = %info.name,
                    run_id,
                    %reason,
                    "task failed; skipping its dependents in this run"
                );
                step.newly_failed.push(info.name.clone());
                let mut manager =
                    StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
                step.newly_skipped = manager.mark_dependents_skipped(task);
                // Independent branches keep going.
                step.newly_scheduled = manager.collect_new_ready_tasks();
            }
        }

        step.run_just_finished = self.maybe_finish_run();
        step
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.graph.tasks()
    }

    /// Clear `current_run_id` once every participating task is terminal.
    fn maybe_finish_run(&mut self) -> bool {
        if self.current_run_id.is_none() {
            return false;
        }

        let manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);

        if manager.all_tasks_terminal() {
            info!(run_id = self.current_run_id, "scheduler: run finished");
            self.current_run_id = None;
            true
        } else {
            false
        }
    }
}
