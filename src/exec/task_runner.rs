// src/exec/task_runner.rs

//! Individual unit invocation.

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::events::BuildEvent;
use crate::exec::ExecEnv;

/// Run one unit invocation and emit exactly one `TaskCompleted` event.
///
/// Unit errors are caught here and turned into `TaskOutcome::Failed`; per
/// file errors are published on the bus and counted in the outcome.
pub async fn run_task(task: ScheduledTask, env: ExecEnv, runtime_tx: mpsc::Sender<RuntimeEvent>) {
    let outcome = invoke(&task, &env).await;

    if runtime_tx
        .send(RuntimeEvent::TaskCompleted {
            task: task.name.clone(),
            outcome,
        })
        .await
        .is_err()
    {
        debug!(task = %task.name, "runtime gone; dropping completion");
    }
}

async fn invoke(task: &ScheduledTask, env: &ExecEnv) -> TaskOutcome {
    let Some(registered) = env.registry.get(&task.name) else {
        error!(task = %task.name, "scheduled task is not registered");
        return TaskOutcome::Failed(format!("unknown task '{}'", task.name));
    };

    env.bus.publish(BuildEvent::TaskStarted {
        task: task.name.clone(),
        run_id: task.run_id,
    });
    info!(
        task = %task.name,
        run_id = task.run_id,
        kind = %registered.unit.kind(),
        "starting task"
    );

    let ctx = env.unit_context(&task.name);
    match registered.unit.run(ctx).await {
        Ok(report) => {
            for file_error in &report.file_errors {
                env.bus.publish(BuildEvent::FileError {
                    task: task.name.clone(),
                    file: file_error.path.clone(),
                    message: file_error.message.clone(),
                });
            }
            if registered.reload() && !report.written.is_empty() {
                env.bus.publish(BuildEvent::OutputChanged {
                    task: task.name.clone(),
                });
            }
            debug!(
                task = %task.name,
                written = report.written.len(),
                unchanged = report.skipped,
                "unit finished"
            );
            TaskOutcome::Success {
                written: report.written.len(),
                file_errors: report.file_errors.len(),
            }
        }
        Err(err) => TaskOutcome::Failed(format!("{err:#}")),
    }
}
