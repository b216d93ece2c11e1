// src/engine/mod.rs

//! Orchestration engine for sitedag.
//!
//! This module ties together:
//! - the DAG scheduler
//! - the trigger queue (what happens when triggers arrive while a run is active)
//! - the main runtime event loop that reacts to:
//!   - run requests (`build`) and file-watch triggers
//!   - task completion events
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Outcome of one unit invocation, as reported to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The unit completed. Per-file errors (template pages) do not fail the
    /// task but are counted.
    Success { written: usize, file_errors: usize },
    Failed(String),
}

impl TaskOutcome {
    pub fn ok() -> Self {
        TaskOutcome::Success {
            written: 0,
            file_errors: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success { .. })
    }
}

/// Why a task was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Explicit request from the command line.
    Manual,
    /// Debounced filesystem change.
    FileWatch,
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Exit once the DAG is idle and there are no queued triggers
    /// (`build`, `run`).
    pub exit_when_idle: bool,
}

/// Events flowing into the runtime from the CLI, watchers and executors.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Start one run containing all of `tasks`.
    RunRequested {
        tasks: Vec<TaskName>,
    },
    /// A task (and its dependents) should run.
    TaskTriggered {
        task: TaskName,
        reason: TriggerReason,
    },
    /// A unit invocation finished.
    TaskCompleted {
        task: TaskName,
        outcome: TaskOutcome,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod build_run;
pub mod core;
pub mod event_handlers;
pub mod queue;
pub mod runtime;

pub use build_run::{BuildRun, TaskStatus};
pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use queue::TriggerQueue;
pub use runtime::Runtime;
