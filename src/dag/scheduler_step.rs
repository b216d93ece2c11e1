// src/dag/scheduler_step.rs

use crate::dag::task_info::ScheduledTask;
use crate::engine::TaskName;

/// Structured result of a single scheduler "step".
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks that became ready to run as a result of this step.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// The task that failed in this step, if any.
    pub newly_failed: Vec<TaskName>,
    /// Dependents that will not run because of that failure.
    pub newly_skipped: Vec<TaskName>,
    /// Whether this step caused the current run to finish.
    pub run_just_finished: bool,
}
