// src/commands.rs

//! The `sitedag` commands, wired from config, scheduler, executor, watcher
//! and preview server.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::loader::{load_and_validate, project_root_for};
use crate::config::model::{ConfigFile, LintSection, StageSpec};
use crate::dag::{DagGraph, Scheduler, StagePlan, TaskRegistry};
use crate::engine::{BuildRun, CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions};
use crate::errors::{Result, SitedagError};
use crate::events::{spawn_reporter, EventBus};
use crate::exec::{ExecEnv, UnitExecutorBackend};
use crate::fs::{FileSystem, RealFileSystem};
use crate::lint::lint_project;
use crate::serve;
use crate::types::UnitKind;
use crate::watch::{build_subscriptions, spawn_watcher, stable_path, ChangeRouter, RuntimeTriggerSink};

/// A loaded, validated project.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub output_root: PathBuf,
    pub cfg: ConfigFile,
    pub registry: Arc<TaskRegistry>,
    pub fs: Arc<dyn FileSystem>,
}

impl Project {
    /// Load `config_path`; the project root is its directory.
    pub fn load(config_path: &Path) -> Result<Self> {
        let cfg = load_and_validate(config_path)?;
        Self::new(project_root_for(config_path), cfg, Arc::new(RealFileSystem))
    }

    pub fn new(root: PathBuf, cfg: ConfigFile, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let registry = TaskRegistry::from_config(&cfg)?;
        let output_root = root.join(&cfg.config_section().output);
        Ok(Self {
            root,
            output_root,
            cfg,
            registry: Arc::new(registry),
            fs,
        })
    }

    pub fn exec_env(&self, bus: &EventBus) -> ExecEnv {
        ExecEnv {
            registry: Arc::clone(&self.registry),
            root: self.root.clone(),
            output_root: self.output_root.clone(),
            fs: Arc::clone(&self.fs),
            bus: bus.clone(),
        }
    }

    /// Plan for a named pipeline, or for a single task plus its `after`
    /// dependencies.
    pub fn plan(&self, name: &str) -> Result<StagePlan> {
        let tasks = self.cfg.tasks();
        let deps_of = |task: &str| tasks.get(task).map(|t| t.after.as_slice());

        if let Some(stages) = self.cfg.pipeline_stages(name) {
            return StagePlan::resolve(name, &stages, deps_of);
        }
        if tasks.contains_key(name) {
            return StagePlan::resolve(name, &[StageSpec::Single(name.to_string())], deps_of);
        }
        Err(SitedagError::TaskNotFound(format!(
            "'{name}' is neither a pipeline nor a task"
        )))
    }

    /// Plan over every task, ordered by `after` only.
    pub fn watch_plan(&self) -> Result<StagePlan> {
        StagePlan::from_dependencies(self.cfg.tasks())
    }
}

/// Run every task of `plan` once and return the finished run.
pub async fn run_plan(project: &Project, plan: &StagePlan, bus: &EventBus) -> Result<BuildRun> {
    let core = CoreRuntime::new(
        Scheduler::from_plan(plan),
        RuntimeOptions {
            exit_when_idle: true,
        },
    );

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executor = UnitExecutorBackend::new(project.exec_env(bus), rt_tx.clone());

    info!(pipeline = %plan.name(), tasks = plan.len(), "starting run");
    rt_tx
        .send(RuntimeEvent::RunRequested {
            tasks: plan.task_names().map(str::to_string).collect(),
        })
        .await
        .map_err(|e| SitedagError::Other(anyhow::anyhow!("runtime channel closed: {e}")))?;

    let runtime = Runtime::new(core, rt_rx, executor, bus.clone());
    let mut runs = runtime.run().await?;
    runs.pop()
        .ok_or_else(|| SitedagError::Other(anyhow::anyhow!("run ended before any task finished")))
}

/// `build` / `run <name>`: exit 0 only when every task succeeded without
/// file errors.
pub async fn build(project: &Project, pipeline: &str) -> Result<i32> {
    let plan = project.plan(pipeline)?;
    let bus = EventBus::default();
    let reporter = spawn_reporter(&bus, true);

    let run = run_plan(project, &plan, &bus).await?;
    // The reporter stops after printing the run summary.
    let _ = reporter.await;

    Ok(if run.succeeded() { 0 } else { 1 })
}

/// `watch`: subscriptions plus preview server until Ctrl-C.
pub async fn watch(project: &Project) -> Result<i32> {
    let bus = EventBus::default();
    let _reporter = spawn_reporter(&bus, false);

    let plan = project.watch_plan()?;
    let core = CoreRuntime::new(
        Scheduler::from_plan(&plan),
        RuntimeOptions {
            exit_when_idle: false,
        },
    );

    std::fs::create_dir_all(&project.output_root)
        .with_context(|| format!("creating {}", project.output_root.display()))?;

    let serve_cfg = project.cfg.serve_section();
    let _server = if serve_cfg.enabled {
        let server = serve::start(serve_cfg, project.output_root.clone(), bus.clone()).await?;
        info!("preview: {}", server.url());
        Some(server)
    } else {
        None
    };

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executor = UnitExecutorBackend::new(project.exec_env(&bus), rt_tx.clone());

    let subscriptions = build_subscriptions(&project.cfg)?;
    if subscriptions.is_empty() {
        warn!("no task has watch patterns; only the preview server is running");
    }
    let router = ChangeRouter::new(
        stable_path(&project.root),
        stable_path(&project.output_root),
        subscriptions,
        DagGraph::from_plan(&plan),
    );
    let _watcher = spawn_watcher(
        router,
        Duration::from_millis(project.cfg.config_section().debounce_ms),
        RuntimeTriggerSink::new(rt_tx.clone(), bus.clone()),
    )?;

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("shutting down");
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let runtime = Runtime::new(core, rt_rx, executor, bus.clone());
    runtime.run().await?;
    Ok(0)
}

/// `default`: build, then watch regardless of the build result.
pub async fn build_then_watch(project: &Project) -> Result<i32> {
    let code = build(project, "build").await?;
    if code != 0 {
        warn!("build failed; watching anyway");
    }
    watch(project).await
}

/// `deploy`: publish failures are reported and turned into exit code 1.
pub async fn deploy(project: &Project) -> Result<i32> {
    match crate::deploy::deploy(&project.cfg, &project.root).await {
        Ok(report) => {
            info!("published {} files to {}", report.files, report.target);
            Ok(0)
        }
        Err(err @ SitedagError::Publish(_)) => {
            error!("{err}");
            Ok(1)
        }
        Err(err) => Err(err),
    }
}

/// `lint`: prints one line per violation to stdout.
pub fn lint(project: &Project) -> Result<i32> {
    let section = lint_section(&project.cfg)?;
    let report = lint_project(
        project.fs.as_ref(),
        &project.root,
        &project.output_root,
        &section,
    )?;

    for violation in &report.violations {
        println!("{violation}");
    }

    if report.is_clean() {
        info!(files = report.files_checked, "lint passed");
        Ok(0)
    } else {
        warn!(
            files = report.files_checked,
            violations = report.violations.len(),
            "lint failed"
        );
        Ok(1)
    }
}

/// `[lint]`, or the watch patterns of the style tasks with default rules.
pub fn lint_section(cfg: &ConfigFile) -> Result<LintSection> {
    if let Some(section) = cfg.lint_section() {
        return Ok(section.clone());
    }
    let input: Vec<String> = cfg
        .tasks()
        .values()
        .filter(|t| t.kind == UnitKind::Style)
        .flat_map(|t| t.effective_watch())
        .collect();
    if input.is_empty() {
        return Err(SitedagError::ConfigError(
            "nothing to lint: add a [lint] section or a style task".to_string(),
        ));
    }
    Ok(LintSection::with_input(input))
}

/// `--dry-run` output for a plan.
pub fn print_plan(plan: &StagePlan) {
    print!("{}", plan.describe());
}
