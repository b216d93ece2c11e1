// src/engine/queue.rs

use std::collections::BTreeSet;

use tracing::debug;

use crate::engine::TaskName;

/// Triggers that arrive for tasks already taking part in the active run.
///
/// Every such trigger is remembered until the scheduler goes idle, then all
/// of them seed one follow-up run. Repeated triggers for the same task
/// coalesce; a trigger for one task never displaces another's.
#[derive(Debug, Default)]
pub struct TriggerQueue {
    pending: BTreeSet<TaskName>,
}

impl TriggerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Record a trigger for a task that is already part of the active run.
    pub fn record_trigger(&mut self, task: &str) {
        let inserted = self.pending.insert(task.to_string());
        debug!(task = %task, inserted, queued = self.pending.len(), "queued trigger for next run");
    }

    /// Drain every queued trigger into one sorted list of roots.
    pub fn drain_pending(&mut self) -> Vec<TaskName> {
        let tasks: Vec<TaskName> = std::mem::take(&mut self.pending).into_iter().collect();
        if !tasks.is_empty() {
            debug!(drained = tasks.len(), "drained queued triggers into new run");
        }
        tasks
    }
}
