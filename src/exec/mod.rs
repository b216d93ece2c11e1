// src/exec/mod.rs

//! Unit execution layer.
//!
//! This module runs the units of scheduled tasks and reports back to the
//! orchestration runtime via `RuntimeEvent`s.
//!
//! - [`executor_loop`] owns the main executor loop, which keeps invocations
//!   of the same task from overlapping.
//! - [`task_runner`] runs one unit invocation and publishes its results.
//! - [`backend`] provides the `ExecutorBackend` trait and the production
//!   `UnitExecutorBackend`; tests can replace it with a fake.

use std::path::PathBuf;
use std::sync::Arc;

use crate::dag::TaskRegistry;
use crate::events::EventBus;
use crate::fs::FileSystem;
use crate::units::UnitContext;

pub mod backend;
pub mod executor_loop;
pub mod task_runner;

pub use backend::{ExecutorBackend, UnitExecutorBackend};
pub use executor_loop::spawn_executor;

/// Everything shared by all unit invocations of one process.
#[derive(Debug, Clone)]
pub struct ExecEnv {
    pub registry: Arc<TaskRegistry>,
    pub root: PathBuf,
    pub output_root: PathBuf,
    pub fs: Arc<dyn FileSystem>,
    pub bus: EventBus,
}

impl ExecEnv {
    pub fn unit_context(&self, task: &str) -> UnitContext {
        UnitContext {
            root: self.root.clone(),
            output_root: self.output_root.clone(),
            fs: Arc::clone(&self.fs),
            task: task.to_string(),
        }
    }
}
