// src/events.rs

//! Build event bus.
//!
//! Runtime, executor and units publish [`BuildEvent`]s on a broadcast
//! channel. The reporter, the watch layer and the live-reload endpoint
//! subscribe independently; publishing with no subscribers is not an error.

use std::path::PathBuf;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::{TaskName, TaskOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    TaskStarted {
        task: TaskName,
        run_id: u64,
    },
    TaskFinished {
        task: TaskName,
        outcome: TaskOutcome,
    },
    /// The task was part of a run but a dependency failed.
    TaskSkipped {
        task: TaskName,
    },
    /// One input file could not be processed.
    FileError {
        task: TaskName,
        file: PathBuf,
        message: String,
    },
    /// A task with `reload = true` wrote new output.
    OutputChanged {
        task: TaskName,
    },
    RunFinished {
        run_id: u64,
        succeeded: bool,
        summary: String,
    },
}

impl BuildEvent {
    /// Name of the task the event is about, if any.
    pub fn task(&self) -> Option<&str> {
        match self {
            BuildEvent::TaskStarted { task, .. }
            | BuildEvent::TaskFinished { task, .. }
            | BuildEvent::TaskSkipped { task }
            | BuildEvent::FileError { task, .. }
            | BuildEvent::OutputChanged { task } => Some(task),
            BuildEvent::RunFinished { .. } => None,
        }
    }
}

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BuildEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: BuildEvent) {
        // Err only means nobody is subscribed.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BuildEvent> {
        self.tx.subscribe()
    }
}

/// Spawn the human-readable reporter: one log line per notable event.
///
/// With `stop_after_run` the reporter returns after the first
/// `RunFinished`, so one-shot commands can await it before exiting.
pub fn spawn_reporter(bus: &EventBus, stop_after_run: bool) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    report(&event);
                    if stop_after_run && matches!(event, BuildEvent::RunFinished { .. }) {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "reporter fell behind; some build events were dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn report(event: &BuildEvent) {
    match event {
        BuildEvent::TaskStarted { task, run_id } => {
            debug!(task = %task, run_id, "task started");
        }
        BuildEvent::TaskFinished {
            task,
            outcome: TaskOutcome::Success { written, file_errors },
        } => {
            if *file_errors > 0 {
                warn!(task = %task, written, file_errors, "task finished with file errors");
            } else {
                info!(task = %task, written, "task finished");
            }
        }
        BuildEvent::TaskFinished {
            task,
            outcome: TaskOutcome::Failed(reason),
        } => {
            error!("task '{task}' failed: {reason}");
        }
        BuildEvent::TaskSkipped { task } => {
            warn!("task '{task}' skipped because a dependency failed");
        }
        BuildEvent::FileError {
            task,
            file,
            message,
        } => {
            error!("[{task}] {}: {message}", file.display());
        }
        BuildEvent::OutputChanged { task } => {
            debug!(task = %task, "output changed");
        }
        BuildEvent::RunFinished {
            succeeded, summary, ..
        } => {
            if *succeeded {
                info!("{summary}");
            } else {
                warn!("{summary}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.publish(BuildEvent::OutputChanged { task: "css".into() });
    }

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(BuildEvent::TaskStarted {
            task: "css".into(),
            run_id: 1,
        });
        bus.publish(BuildEvent::OutputChanged { task: "css".into() });

        assert_eq!(rx.recv().await.unwrap().task(), Some("css"));
        assert!(matches!(
            rx.recv().await.unwrap(),
            BuildEvent::OutputChanged { .. }
        ));
    }
}
