// src/config/validate.rs

use std::path::{Component, Path};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{default_build_stages, ConfigFile, RawConfigFile, TaskConfig};
use crate::dag::plan::StagePlan;
use crate::errors::{Result, SitedagError};
use crate::fileset::FileSetBinding;
use crate::types::{PublishKind, UnitKind};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::SitedagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    for (name, task) in cfg.task.iter() {
        validate_task(name, task)?;
    }
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    validate_pipelines(cfg)?;
    validate_deploy(cfg)?;
    validate_lint(cfg)?;
    Ok(())
}

fn config_err(msg: impl Into<String>) -> SitedagError {
    SitedagError::ConfigError(msg.into())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(config_err(
            "config must contain at least one [task.<name>] section",
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_contained_path("[config].output", &cfg.config.output)?;
    Ok(())
}

/// Paths that tasks write to or delete must stay strictly inside the
/// project root.
fn ensure_contained_path(what: &str, value: &str) -> Result<()> {
    let path = Path::new(value);
    if path.is_absolute() {
        return Err(config_err(format!(
            "{what} must be relative to the project root (got '{value}')"
        )));
    }
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            _ => {
                return Err(config_err(format!(
                    "{what} must not leave the project root (got '{value}')"
                )));
            }
        }
    }
    if depth == 0 {
        return Err(config_err(format!(
            "{what} must name a directory below the project root (got '{value}')"
        )));
    }
    Ok(())
}

fn validate_task(name: &str, task: &TaskConfig) -> Result<()> {
    if name.trim().is_empty() {
        return Err(config_err("task names must not be empty"));
    }

    if task.kind.reads_file_set() && task.input.is_empty() {
        return Err(config_err(format!(
            "task '{name}' (kind = \"{}\") needs at least one `input` pattern",
            task.kind
        )));
    }

    match task.kind {
        UnitKind::Concat => {
            let file = task.file.as_deref().unwrap_or("");
            if file.trim().is_empty() || file.contains('/') {
                return Err(config_err(format!(
                    "task '{name}' (kind = \"concat\") needs a plain `file` name"
                )));
            }
        }
        UnitKind::Command => {
            if task.cmd.as_deref().is_none_or(|c| c.trim().is_empty()) {
                return Err(config_err(format!(
                    "task '{name}' (kind = \"command\") needs a `cmd`"
                )));
            }
        }
        UnitKind::Clean => {
            if let Some(path) = &task.path {
                ensure_contained_path(&format!("task '{name}' path"), path)?;
            }
        }
        UnitKind::Template => {
            if task.extension.trim().is_empty() || task.extension.contains('/') {
                return Err(config_err(format!(
                    "task '{name}' has an invalid template `extension`"
                )));
            }
        }
        UnitKind::Style | UnitKind::Copy => {}
    }

    if let Some(output) = &task.output {
        if Path::new(output).components().any(|c| {
            matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
        }) {
            return Err(config_err(format!(
                "task '{name}' output must stay inside the output root (got '{output}')"
            )));
        }
    }

    FileSetBinding::new(
        &task.input,
        &task.exclude,
        task.base.as_deref(),
        task.output_dir(),
        task.dot,
    )
    .map_err(|e| config_err(format!("task '{name}': {e:#}")))?;

    let watch = task.effective_watch();
    if !watch.is_empty() {
        FileSetBinding::new(&watch, &task.exclude, None, ".", task.dot)
            .map_err(|e| config_err(format!("task '{name}' watch: {e:#}")))?;
    }

    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(config_err(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(config_err(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> task.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(SitedagError::DagCycle(format!(
                "cycle detected in task DAG involving task '{}'",
                node
            )))
        }
    }
}

fn validate_pipelines(cfg: &RawConfigFile) -> Result<()> {
    let deps_of = |name: &str| cfg.task.get(name).map(|t| t.after.as_slice());

    for (name, stages) in cfg.pipeline.iter() {
        if cfg.task.contains_key(name) {
            return Err(config_err(format!(
                "pipeline '{name}' has the same name as a task"
            )));
        }
        StagePlan::resolve(name, stages, deps_of).map_err(|e| match e {
            SitedagError::ConfigError(msg) => config_err(format!("[pipeline].{name}: {msg}")),
            other => other,
        })?;
    }

    if !cfg.pipeline.contains_key("build") {
        StagePlan::resolve("build", &default_build_stages(&cfg.task), deps_of)?;
    }
    Ok(())
}

fn validate_deploy(cfg: &RawConfigFile) -> Result<()> {
    let Some(deploy) = &cfg.deploy else {
        return Ok(());
    };
    match deploy.kind {
        PublishKind::Directory => {
            if deploy.path.as_deref().is_none_or(|p| p.trim().is_empty()) {
                return Err(config_err(
                    "[deploy] kind = \"directory\" needs a `path`",
                ));
            }
        }
        PublishKind::Git => {
            if deploy.branch.trim().is_empty() || deploy.remote.trim().is_empty() {
                return Err(config_err("[deploy] needs a non-empty `remote` and `branch`"));
            }
        }
    }
    Ok(())
}

fn validate_lint(cfg: &RawConfigFile) -> Result<()> {
    let Some(lint) = &cfg.lint else {
        return Ok(());
    };
    if lint.input.is_empty() {
        return Err(config_err("[lint] needs at least one `input` pattern"));
    }
    FileSetBinding::new(&lint.input, &lint.exclude, None, ".", false)
        .map_err(|e| config_err(format!("[lint]: {e:#}")))?;
    Ok(())
}
