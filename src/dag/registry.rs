// src/dag/registry.rs

//! The set of tasks known to a project, built once at startup.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::model::{ConfigFile, TaskConfig};
use crate::engine::TaskName;
use crate::errors::{Result, SitedagError};
use crate::units::{build_unit, Transform};

/// A configured task and its unit of work.
#[derive(Debug, Clone)]
pub struct RegisteredTask {
    pub name: TaskName,
    pub config: TaskConfig,
    pub unit: Arc<dyn Transform>,
}

impl RegisteredTask {
    /// Whether viewers should be told when this task writes output.
    pub fn reload(&self) -> bool {
        self.config.reload
    }
}

/// Every task of a project, shared read-only by the executor and the watch
/// layer.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<TaskName, RegisteredTask>,
}

impl TaskRegistry {
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let mut registry = Self::default();
        for (name, task) in cfg.tasks() {
            let unit = build_unit(name, task)
                .map_err(|e| SitedagError::ConfigError(format!("{e:#}")))?;
            registry.insert(name.clone(), task.clone(), unit);
        }
        Ok(registry)
    }

    /// Register `unit` under `name`, replacing any previous task of that
    /// name.
    pub fn insert(&mut self, name: TaskName, config: TaskConfig, unit: Arc<dyn Transform>) {
        self.tasks.insert(
            name.clone(),
            RegisteredTask { name, config, unit },
        );
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTask> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredTask> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
