// src/watch/subscription.rs

//! Per-task watch subscriptions.
//!
//! A subscription binds one task's watch patterns to that task. Changes
//! routed to it are debounced; when the quiet period passes, the task is
//! triggered through a [`TriggerSink`] and the subscription waits for the
//! invocation to finish before it can trigger again.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::config::ConfigFile;
use crate::engine::{RuntimeEvent, TaskName, TriggerReason};
use crate::errors::{Result, SitedagError};
use crate::events::{BuildEvent, EventBus};
use crate::fileset::FileSetBinding;
use crate::watch::debounce::Debouncer;

/// One task's watch binding.
#[derive(Debug, Clone)]
pub struct WatchSubscription {
    pub task: TaskName,
    pub binding: FileSetBinding,
}

impl WatchSubscription {
    pub fn matches(&self, rel_path: &str) -> bool {
        self.binding.matches(rel_path)
    }
}

/// Subscriptions for every task with a non-empty watch list.
pub fn build_subscriptions(cfg: &ConfigFile) -> Result<Vec<WatchSubscription>> {
    let mut subs = Vec::new();
    for (name, task) in cfg.tasks() {
        let patterns = task.effective_watch();
        if patterns.is_empty() {
            debug!(task = %name, "task has no watch patterns; not watching");
            continue;
        }
        let binding = FileSetBinding::new(&patterns, &task.exclude, None, ".", task.dot)
            .map_err(|e| SitedagError::ConfigError(format!("task '{name}': {e:#}")))?;
        subs.push(WatchSubscription {
            task: name.clone(),
            binding,
        });
    }
    Ok(subs)
}

/// Where a flushed batch goes.
///
/// The returned future resolves once the triggered invocation has
/// completed (or can no longer be observed).
pub trait TriggerSink: Send + Sync {
    fn trigger(
        &self,
        task: &str,
        batch: Vec<PathBuf>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Production sink: sends `TaskTriggered` into the runtime and waits on the
/// event bus for the task to finish.
#[derive(Debug, Clone)]
pub struct RuntimeTriggerSink {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    bus: EventBus,
}

impl RuntimeTriggerSink {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, bus: EventBus) -> Self {
        Self { runtime_tx, bus }
    }
}

impl TriggerSink for RuntimeTriggerSink {
    fn trigger(
        &self,
        task: &str,
        batch: Vec<PathBuf>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        let task = task.to_string();
        Box::pin(async move {
            // Subscribe before triggering so the completion cannot be missed.
            let mut events = self.bus.subscribe();

            debug!(task = %task, changed = batch.len(), "watch batch flushed; triggering task");
            if self
                .runtime_tx
                .send(RuntimeEvent::TaskTriggered {
                    task: task.clone(),
                    reason: TriggerReason::FileWatch,
                })
                .await
                .is_err()
            {
                warn!(task = %task, "runtime gone; dropping trigger");
                return;
            }

            wait_for_completion(&task, &mut events).await;
        })
    }
}

/// Wait until `task` finishes or is skipped. The end of a run also ends
/// the wait, since a trigger dropped by the queue never produces a task
/// event.
async fn wait_for_completion(task: &str, events: &mut broadcast::Receiver<BuildEvent>) {
    loop {
        match events.recv().await {
            Ok(BuildEvent::TaskFinished { task: t, .. }) | Ok(BuildEvent::TaskSkipped { task: t })
                if t == task =>
            {
                return;
            }
            Ok(BuildEvent::RunFinished { .. }) => return,
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(_)) => return,
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

/// Drive one subscription until its change channel closes.
///
/// Never runs two triggers of the same subscription at once; changes that
/// arrive while a trigger is in flight are held for the next batch.
pub async fn run_subscription<S: TriggerSink>(
    task: TaskName,
    quiet: Duration,
    mut changes: mpsc::Receiver<PathBuf>,
    sink: S,
) {
    let mut debouncer = Debouncer::new(quiet);
    let mut open = true;

    loop {
        match debouncer.deadline() {
            None => {
                if !open {
                    break;
                }
                match changes.recv().await {
                    Some(path) => debouncer.on_change(path, Instant::now()),
                    None => break,
                }
            }
            Some(deadline) => {
                tokio::select! {
                    maybe = changes.recv(), if open => match maybe {
                        Some(path) => debouncer.on_change(path, Instant::now()),
                        // Flush what is pending, then stop.
                        None => open = false,
                    },
                    _ = sleep_until(deadline) => {}
                }
            }
        }

        let Some(batch) = debouncer.poll_flush(Instant::now()) else {
            continue;
        };

        let trigger = sink.trigger(&task, batch);
        tokio::pin!(trigger);
        loop {
            tokio::select! {
                _ = &mut trigger => break,
                maybe = changes.recv(), if open => match maybe {
                    Some(path) => debouncer.on_change(path, Instant::now()),
                    None => open = false,
                },
            }
        }
        debouncer.on_trigger_complete(Instant::now());
    }

    debug!(task = %task, "watch subscription stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::config::model::{RawConfigFile, TaskConfig};
    use crate::types::UnitKind;

    #[derive(Clone, Default)]
    struct CountingSink {
        batches: Arc<Mutex<Vec<Vec<PathBuf>>>>,
        busy_for: Duration,
    }

    impl TriggerSink for CountingSink {
        fn trigger(
            &self,
            _task: &str,
            batch: Vec<PathBuf>,
        ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
            Box::pin(async move {
                self.batches.lock().unwrap().push(batch);
                tokio::time::sleep(self.busy_for).await;
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn three_rapid_changes_trigger_once() {
        let sink = CountingSink::default();
        let batches = Arc::clone(&sink.batches);
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(run_subscription(
            "css".into(),
            Duration::from_millis(100),
            rx,
            sink,
        ));

        for name in ["a.scss", "b.scss", "a.scss"] {
            tx.send(PathBuf::from(name)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        drop(tx);
        handle.await.unwrap();

        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], vec![PathBuf::from("a.scss"), PathBuf::from("b.scss")]);
    }

    #[tokio::test(start_paused = true)]
    async fn change_during_trigger_runs_again_after_completion() {
        let sink = CountingSink {
            busy_for: Duration::from_millis(300),
            ..Default::default()
        };
        let batches = Arc::clone(&sink.batches);
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(run_subscription(
            "css".into(),
            Duration::from_millis(100),
            rx,
            sink,
        ));

        tx.send(PathBuf::from("a.scss")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        // Triggering now; held for the next batch.
        tx.send(PathBuf::from("b.scss")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(batches.lock().unwrap().len(), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(tx);
        handle.await.unwrap();

        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1], vec![PathBuf::from("b.scss")]);
    }

    #[test]
    fn tasks_without_watch_patterns_get_no_subscription() {
        let mut raw = RawConfigFile::default();
        let mut css = TaskConfig::of_kind(UnitKind::Style);
        css.input = vec!["src/scss/**/*.scss".into()];
        raw.task.insert("css".into(), css);
        raw.task.insert("clean".into(), TaskConfig::of_kind(UnitKind::Clean));
        let mut images = TaskConfig::of_kind(UnitKind::Copy);
        images.input = vec!["src/img/**/*".into()];
        images.watch = Some(Vec::new());
        raw.task.insert("images".into(), images);

        let cfg = ConfigFile::try_from(raw).unwrap();
        let subs = build_subscriptions(&cfg).unwrap();

        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].task, "css");
        assert!(subs[0].matches("src/scss/main.scss"));
        assert!(!subs[0].matches("src/img/logo.png"));
    }
}
