// src/engine/build_run.rs

//! Bookkeeping for one execution of a plan.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::engine::{TaskName, TaskOutcome};

/// Status of a task within a [`BuildRun`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded { written: usize, file_errors: usize },
    Failed(String),
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }
}

impl From<&TaskOutcome> for TaskStatus {
    fn from(outcome: &TaskOutcome) -> Self {
        match outcome {
            TaskOutcome::Success {
                written,
                file_errors,
            } => TaskStatus::Succeeded {
                written: *written,
                file_errors: *file_errors,
            },
            TaskOutcome::Failed(reason) => TaskStatus::Failed(reason.clone()),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => f.write_str("pending"),
            TaskStatus::Running => f.write_str("running"),
            TaskStatus::Succeeded {
                written,
                file_errors: 0,
            } => write!(f, "ok ({written} written)"),
            TaskStatus::Succeeded {
                written,
                file_errors,
            } => write!(f, "ok with errors ({written} written, {file_errors} failed)"),
            TaskStatus::Failed(reason) => write!(f, "failed: {reason}"),
            TaskStatus::Skipped => f.write_str("skipped"),
        }
    }
}

/// One run of the scheduler: which tasks took part and how they ended.
#[derive(Debug, Clone)]
pub struct BuildRun {
    pub run_id: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    tasks: BTreeMap<TaskName, TaskStatus>,
}

impl BuildRun {
    pub fn new(run_id: u64) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            tasks: BTreeMap::new(),
        }
    }

    pub fn set_status(&mut self, task: &str, status: TaskStatus) {
        self.tasks.insert(task.to_string(), status);
    }

    pub fn status_of(&self, task: &str) -> Option<&TaskStatus> {
        self.tasks.get(task)
    }

    pub fn tasks(&self) -> impl Iterator<Item = (&str, &TaskStatus)> {
        self.tasks.iter().map(|(name, status)| (name.as_str(), status))
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn failed_tasks(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|(_, s)| matches!(s, TaskStatus::Failed(_)))
            .map(|(n, _)| n.as_str())
            .collect()
    }

    pub fn skipped_tasks(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|(_, s)| matches!(s, TaskStatus::Skipped))
            .map(|(n, _)| n.as_str())
            .collect()
    }

    pub fn file_error_count(&self) -> usize {
        self.tasks
            .values()
            .map(|s| match s {
                TaskStatus::Succeeded { file_errors, .. } => *file_errors,
                _ => 0,
            })
            .sum()
    }

    /// Every task succeeded and no file reported an error.
    pub fn succeeded(&self) -> bool {
        self.tasks
            .values()
            .all(|s| matches!(s, TaskStatus::Succeeded { file_errors: 0, .. }))
    }

    /// One-line summary for the end of a run.
    pub fn summary(&self) -> String {
        let total = self.tasks.len();
        let ok = self
            .tasks
            .values()
            .filter(|s| matches!(s, TaskStatus::Succeeded { .. }))
            .count();
        let elapsed = self
            .finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
            .unwrap_or(0);

        let mut line = format!("run {}: {ok}/{total} tasks succeeded in {elapsed}ms", self.run_id);
        let failed = self.failed_tasks();
        if !failed.is_empty() {
            line.push_str(&format!(", failed: {}", failed.join(", ")));
        }
        let skipped = self.skipped_tasks();
        if !skipped.is_empty() {
            line.push_str(&format!(", skipped: {}", skipped.join(", ")));
        }
        let file_errors = self.file_error_count();
        if file_errors > 0 {
            line.push_str(&format!(", {file_errors} file error(s)"));
        }
        line
    }
}
