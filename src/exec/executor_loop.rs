// src/exec/executor_loop.rs

//! Main executor loop that manages running unit invocations.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::exec::task_runner::run_task;
use crate::exec::ExecEnv;

/// Spawn the background executor loop.
///
/// Each scheduled task runs in its own Tokio task. Per task name there is
/// never more than one invocation running: a new invocation of a task whose
/// previous invocation is still in flight waits for it to finish first.
pub fn spawn_executor(env: ExecEnv, runtime_tx: mpsc::Sender<RuntimeEvent>) -> mpsc::Sender<ScheduledTask> {
    let (tx, mut rx) = mpsc::channel::<ScheduledTask>(32);

    tokio::spawn(async move {
        debug!("executor loop started");

        // Latest invocation per task name.
        let mut active: HashMap<String, JoinHandle<()>> = HashMap::new();

        while let Some(task) = rx.recv().await {
            handle_scheduled_task(task, &mut active, &env, &runtime_tx);
        }

        debug!("executor loop finished (channel closed)");
    });

    tx
}

fn handle_scheduled_task(
    task: ScheduledTask,
    active: &mut HashMap<String, JoinHandle<()>>,
    env: &ExecEnv,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) {
    let name = task.name.clone();

    let previous = active
        .remove(&name)
        .filter(|handle| !handle.is_finished());
    if previous.is_some() {
        info!(
            task = %name,
            run_id = task.run_id,
            "previous invocation still running; new one will wait for it"
        );
    }

    let env = env.clone();
    let rt_tx = runtime_tx.clone();
    let handle = tokio::spawn(async move {
        if let Some(previous) = previous {
            // A panicked predecessor is already reported by its own runner.
            let _ = previous.await;
        }
        run_task(task, env, rt_tx).await;
    });

    active.insert(name, handle);
}
