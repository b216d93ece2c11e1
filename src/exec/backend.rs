// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of a raw mpsc sender,
//! so tests can swap in a fake executor that records which tasks were
//! scheduled and emits `TaskCompleted` events directly.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::errors::{Result, SitedagError};
use crate::exec::executor_loop::spawn_executor;
use crate::exec::ExecEnv;

/// Trait abstracting how scheduled tasks are executed.
pub trait ExecutorBackend: Send {
    /// Dispatch the given tasks for execution. Completion is reported later
    /// as `RuntimeEvent::TaskCompleted`.
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production backend: forwards scheduled tasks to the executor loop,
/// which runs each task's unit.
pub struct UnitExecutorBackend {
    tx: mpsc::Sender<ScheduledTask>,
}

impl UnitExecutorBackend {
    /// Spawns the background executor loop immediately.
    pub fn new(env: ExecEnv, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        let tx = spawn_executor(env, runtime_tx);
        Self { tx }
    }
}

impl ExecutorBackend for UnitExecutorBackend {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();

        Box::pin(async move {
            for task in tasks {
                tx.send(task).await.map_err(|e| {
                    SitedagError::Other(anyhow::anyhow!("executor loop stopped: {e}"))
                })?;
            }
            Ok(())
        })
    }
}
