// src/watch/watcher.rs

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dag::DagGraph;
use crate::watch::dag_filter::trigger_roots;
use crate::watch::path_utils::{is_within, relative_str};
use crate::watch::subscription::{run_subscription, TriggerSink, WatchSubscription};

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive. Dropping this handle
/// stops file watching and the subscription tasks.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Decides which subscriptions a filesystem event concerns.
#[derive(Debug)]
pub struct ChangeRouter {
    root: PathBuf,
    output_root: PathBuf,
    subscriptions: Vec<WatchSubscription>,
    graph: DagGraph,
}

impl ChangeRouter {
    pub fn new(
        root: PathBuf,
        output_root: PathBuf,
        subscriptions: Vec<WatchSubscription>,
        graph: DagGraph,
    ) -> Self {
        Self {
            root,
            output_root,
            subscriptions,
            graph,
        }
    }

    pub fn subscriptions(&self) -> &[WatchSubscription] {
        &self.subscriptions
    }

    /// `(subscription index, path)` pairs for one notify event.
    ///
    /// Access events and paths under the output root are ignored. When a
    /// path matches several tasks, only those without a matching ancestor
    /// are routed.
    pub fn route(&self, event: &Event) -> Vec<(usize, PathBuf)> {
        if matches!(event.kind, EventKind::Access(_)) {
            return Vec::new();
        }

        let mut routed = Vec::new();
        for path in &event.paths {
            if is_within(path, &self.output_root) {
                continue;
            }
            let Some(rel) = relative_str(&self.root, path) else {
                warn!("could not relativize path {:?} against root {:?}", path, self.root);
                continue;
            };

            let matching: BTreeSet<String> = self
                .subscriptions
                .iter()
                .filter(|s| s.matches(&rel))
                .map(|s| s.task.clone())
                .collect();
            for task in trigger_roots(&matching, &self.graph) {
                if let Some(index) = self.subscriptions.iter().position(|s| s.task == task) {
                    debug!(task = %task, path = %rel, "watch match");
                    routed.push((index, path.clone()));
                }
            }
        }
        routed
    }
}

/// Spawn a filesystem watcher on `router`'s root plus one debouncing task
/// per subscription.
pub fn spawn_watcher<S>(router: ChangeRouter, quiet: Duration, sink: S) -> Result<WatcherHandle>
where
    S: TriggerSink + Clone + 'static,
{
    let root = router.root.clone();

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    // No tracing context on notify's thread.
                    eprintln!("sitedag: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("sitedag: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!("file watcher started on {:?}", root);

    let mut tasks = Vec::new();
    let mut senders = Vec::new();
    for sub in router.subscriptions() {
        let (tx, rx) = mpsc::channel::<PathBuf>(64);
        senders.push(tx);
        tasks.push(tokio::spawn(run_subscription(
            sub.task.clone(),
            quiet,
            rx,
            sink.clone(),
        )));
    }

    let router = Arc::new(router);
    tasks.push(tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            debug!(?event, "received notify event");
            for (index, path) in router.route(&event) {
                if senders[index].send(path).await.is_err() {
                    debug!("subscription channel closed");
                }
            }
        }
        debug!("watcher event loop finished");
    }));

    Ok(WatcherHandle {
        _inner: watcher,
        tasks,
    })
}

/// Absolute, canonical form of `path` when it exists.
pub fn stable_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
