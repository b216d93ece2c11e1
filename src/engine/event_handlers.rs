// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::dag::{ScheduledTask, Scheduler, TaskRunState};
use crate::engine::build_run::{BuildRun, TaskStatus};
use crate::engine::queue::TriggerQueue;
use crate::engine::{RuntimeOptions, TaskName, TaskOutcome, TriggerReason};
use crate::events::BuildEvent;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// Publish an event on the build event bus.
    Publish(BuildEvent),
    /// A run reached a terminal state.
    RunFinished(BuildRun),
    /// Request that the runtime exits (idle in `exit_when_idle` mode).
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Handle a request to run a set of tasks together.
///
/// When idle, the tasks (plus anything queued) seed a new run. Otherwise
/// each task is handled like an individual trigger. A request that leaves
/// the scheduler idle ends the loop in `exit_when_idle` mode.
pub fn handle_run_request(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    current: &mut Option<BuildRun>,
    options: &RuntimeOptions,
    tasks: Vec<TaskName>,
) -> CoreStep {
    if scheduler.is_idle() {
        let mut triggers: BTreeSet<TaskName> = queue.drain_pending().into_iter().collect();
        triggers.extend(tasks);
        let mut step =
            start_new_run_from_triggers(scheduler, current, triggers.into_iter().collect());
        if options.exit_when_idle && scheduler.is_idle() && queue.is_empty() {
            step.keep_running = false;
            step.commands.push(CoreCommand::RequestExit);
        }
        return step;
    }

    let mut commands = Vec::new();
    for task in tasks {
        let step = handle_task_trigger(scheduler, queue, current, task, TriggerReason::Manual);
        commands.extend(step.commands);
    }
    CoreStep::running(commands)
}

/// Handle a task trigger event.
///
/// - If the scheduler is idle, start a new run seeded with this trigger plus
///   anything already queued.
/// - If a run is active and `task` is not part of it, merge the task (and
///   its dependents) into the active run.
/// - If `task` is already part of the active run, record it for the
///   follow-up run.
pub fn handle_task_trigger(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    current: &mut Option<BuildRun>,
    task: TaskName,
    reason: TriggerReason,
) -> CoreStep {
    if !scheduler.contains(&task) {
        warn!(task = %task, ?reason, "trigger for a task outside the plan; ignoring");
        return CoreStep::running(Vec::new());
    }

    if scheduler.is_idle() {
        let mut triggers: BTreeSet<TaskName> = queue.drain_pending().into_iter().collect();
        triggers.insert(task);
        return start_new_run_from_triggers(scheduler, current, triggers.into_iter().collect());
    }

    let mut commands = Vec::new();
    match scheduler.run_state_of(&task) {
        Some(TaskRunState::NotInRun) => {
            debug!(task = %task, ?reason, "merging trigger into the active run");
            let newly_ready = scheduler.handle_trigger(&task);
            if let Some(run) = current.as_mut() {
                sync_pending(scheduler, run);
            }
            dispatch(current, newly_ready, &mut commands);
        }
        Some(_) => {
            queue.record_trigger(&task);
        }
        None => {}
    }

    CoreStep::running(commands)
}

/// Handle a task completion event.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    current: &mut Option<BuildRun>,
    options: &RuntimeOptions,
    task: TaskName,
    outcome: TaskOutcome,
) -> CoreStep {
    let mut commands = Vec::new();

    let was_running = scheduler.run_state_of(&task) == Some(TaskRunState::Running);
    let step = scheduler.step_completion(&task, &outcome);

    if was_running {
        if let Some(run) = current.as_mut() {
            run.set_status(&task, TaskStatus::from(&outcome));
        }
        commands.push(CoreCommand::Publish(BuildEvent::TaskFinished {
            task: task.clone(),
            outcome,
        }));
    }

    for skipped in step.newly_skipped {
        if let Some(run) = current.as_mut() {
            run.set_status(&skipped, TaskStatus::Skipped);
        }
        commands.push(CoreCommand::Publish(BuildEvent::TaskSkipped { task: skipped }));
    }

    dispatch(current, step.newly_scheduled, &mut commands);

    if step.run_just_finished {
        finish_run(current, &mut commands);
    }

    commands.extend(maybe_start_queued_run(scheduler, queue, current));

    let mut keep_running = true;
    if options.exit_when_idle && scheduler.is_idle() && queue.is_empty() {
        keep_running = false;
        commands.push(CoreCommand::RequestExit);
    }

    CoreStep {
        commands,
        keep_running,
    }
}

/// Seed a new run from root triggers.
pub fn start_new_run_from_triggers(
    scheduler: &mut Scheduler,
    current: &mut Option<BuildRun>,
    triggers: Vec<TaskName>,
) -> CoreStep {
    let mut commands = Vec::new();

    if triggers.is_empty() {
        return CoreStep::running(commands);
    }

    let run_id = scheduler.start_new_run();
    let mut run = BuildRun::new(run_id);

    let mut all_ready = Vec::new();
    for task in triggers {
        all_ready.extend(scheduler.handle_trigger(&task));
    }
    sync_pending(scheduler, &mut run);
    *current = Some(run);

    dispatch(current, all_ready, &mut commands);

    if scheduler.is_idle() {
        finish_run(current, &mut commands);
    }

    CoreStep::running(commands)
}

/// If the scheduler is idle and there are queued triggers, start a new run.
fn maybe_start_queued_run(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    current: &mut Option<BuildRun>,
) -> Vec<CoreCommand> {
    if !scheduler.is_idle() {
        return Vec::new();
    }

    let triggers = queue.drain_pending();
    if triggers.is_empty() {
        return Vec::new();
    }

    start_new_run_from_triggers(scheduler, current, triggers).commands
}

/// Record every task the scheduler has pulled into the run as `Pending`.
fn sync_pending(scheduler: &Scheduler, run: &mut BuildRun) {
    for name in scheduler.tasks_in_current_run() {
        if run.status_of(&name).is_none() {
            run.set_status(&name, TaskStatus::Pending);
        }
    }
}

fn dispatch(
    current: &mut Option<BuildRun>,
    tasks: Vec<ScheduledTask>,
    commands: &mut Vec<CoreCommand>,
) {
    if tasks.is_empty() {
        return;
    }
    if let Some(run) = current.as_mut() {
        for task in &tasks {
            run.set_status(&task.name, TaskStatus::Running);
        }
    }
    commands.push(CoreCommand::DispatchTasks(tasks));
}

fn finish_run(current: &mut Option<BuildRun>, commands: &mut Vec<CoreCommand>) {
    let Some(mut run) = current.take() else {
        return;
    };
    run.finish();
    commands.push(CoreCommand::Publish(BuildEvent::RunFinished {
        run_id: run.run_id,
        succeeded: run.succeeded(),
        summary: run.summary(),
    }));
    commands.push(CoreCommand::RunFinished(run));
}
