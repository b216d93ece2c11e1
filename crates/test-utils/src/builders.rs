#![allow(dead_code)]

use sitedag::config::model::{LintSection, StageSpec};
use sitedag::config::{ConfigFile, RawConfigFile, TaskConfig};
use sitedag::errors::Result;
use sitedag::types::UnitKind;

/// Builder for `ConfigFile` to simplify test setup.
#[derive(Default)]
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_output(mut self, output: &str) -> Self {
        self.config.config.output = output.to_string();
        self
    }

    /// Declare `[pipeline].<name>`; each inner slice is one stage.
    pub fn with_pipeline(mut self, name: &str, stages: &[&[&str]]) -> Self {
        let stages = stages
            .iter()
            .map(|stage| match stage {
                [single] => StageSpec::Single(single.to_string()),
                many => StageSpec::Concurrent(many.iter().map(|s| s.to_string()).collect()),
            })
            .collect();
        self.config.pipeline.insert(name.to_string(), stages);
        self
    }

    pub fn with_lint(mut self, lint: LintSection) -> Self {
        self.config.lint = Some(lint);
        self
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(kind: UnitKind) -> Self {
        Self {
            task: TaskConfig::of_kind(kind),
        }
    }

    /// A command task running `cmd`.
    pub fn command(cmd: &str) -> Self {
        let mut builder = Self::new(UnitKind::Command);
        builder.task.cmd = Some(cmd.to_string());
        builder
    }

    pub fn input(mut self, pattern: &str) -> Self {
        self.task.input.push(pattern.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.task.exclude.push(pattern.to_string());
        self
    }

    pub fn output(mut self, dir: &str) -> Self {
        self.task.output = Some(dir.to_string());
        self
    }

    pub fn file(mut self, file: &str) -> Self {
        self.task.file = Some(file.to_string());
        self
    }

    pub fn base(mut self, base: &str) -> Self {
        self.task.base = Some(base.to_string());
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn watch(mut self, pattern: &str) -> Self {
        self.task
            .watch
            .get_or_insert_with(Vec::new)
            .push(pattern.to_string());
        self
    }

    pub fn source_map(mut self, val: bool) -> Self {
        self.task.source_map = val;
        self
    }

    pub fn minify(mut self, val: bool) -> Self {
        self.task.minify = val;
        self
    }

    pub fn dot(mut self, val: bool) -> Self {
        self.task.dot = val;
        self
    }

    pub fn path(mut self, path: &str) -> Self {
        self.task.path = Some(path.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
