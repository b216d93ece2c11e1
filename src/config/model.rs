// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{PublishKind, StyleOutput, UnitKind};

/// Top-level configuration as read from `Sitedag.toml`.
///
/// ```toml
/// [config]
/// output = "dist"
///
/// [pipeline]
/// build = ["clean", ["css", "js:main", "images"]]
///
/// [task.clean]
/// kind = "clean"
///
/// [task.css]
/// kind = "style"
/// input = ["src/sass/main.scss"]
/// watch = ["src/sass/**/*.scss"]
/// output = "css"
/// source_map = true
/// ```
///
/// All sections except `[task.*]` are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Live-preview server settings from `[serve]`.
    #[serde(default)]
    pub serve: ServeSection,

    /// Named stage sequences from `[pipeline]`.
    #[serde(default)]
    pub pipeline: BTreeMap<String, Vec<StageSpec>>,

    #[serde(default)]
    pub deploy: Option<DeploySection>,

    #[serde(default)]
    pub lint: Option<LintSection>,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated configuration.
///
/// Construct via `ConfigFile::try_from(raw)` (see `config::validate`) or
/// [`crate::config::loader::load_and_validate`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    serve: ServeSection,
    pipeline: BTreeMap<String, Vec<StageSpec>>,
    deploy: Option<DeploySection>,
    lint: Option<LintSection>,
    task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            serve: raw.serve,
            pipeline: raw.pipeline,
            deploy: raw.deploy,
            lint: raw.lint,
            task: raw.task,
        }
    }

    pub fn config_section(&self) -> &ConfigSection {
        &self.config
    }

    pub fn serve_section(&self) -> &ServeSection {
        &self.serve
    }

    pub fn pipelines(&self) -> &BTreeMap<String, Vec<StageSpec>> {
        &self.pipeline
    }

    pub fn deploy_section(&self) -> Option<&DeploySection> {
        self.deploy.as_ref()
    }

    pub fn lint_section(&self) -> Option<&LintSection> {
        self.lint.as_ref()
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    /// Stages of the named pipeline.
    ///
    /// `build` falls back to "every clean task, then everything else
    /// concurrently" when not declared.
    pub fn pipeline_stages(&self, name: &str) -> Option<Vec<StageSpec>> {
        if let Some(stages) = self.pipeline.get(name) {
            return Some(stages.clone());
        }
        if name == "build" {
            return Some(default_build_stages(&self.task));
        }
        None
    }
}

pub(crate) fn default_build_stages(tasks: &BTreeMap<String, TaskConfig>) -> Vec<StageSpec> {
    let clean: Vec<String> = tasks
        .iter()
        .filter(|(_, t)| t.kind == UnitKind::Clean)
        .map(|(name, _)| name.clone())
        .collect();
    let rest: Vec<String> = tasks
        .iter()
        .filter(|(_, t)| t.kind != UnitKind::Clean)
        .map(|(name, _)| name.clone())
        .collect();

    [clean, rest]
        .into_iter()
        .filter(|names| !names.is_empty())
        .map(StageSpec::Concurrent)
        .collect()
}

/// One stage of a pipeline: a single task, or a list run concurrently.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StageSpec {
    Single(String),
    Concurrent(Vec<String>),
}

impl StageSpec {
    pub fn names(&self) -> Vec<&str> {
        match self {
            StageSpec::Single(name) => vec![name.as_str()],
            StageSpec::Concurrent(names) => names.iter().map(|s| s.as_str()).collect(),
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Output root, relative to the project root.
    #[serde(default = "default_output")]
    pub output: String,

    /// Quiet period for watch batching, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_output() -> String {
    "dist".to_string()
}

fn default_debounce_ms() -> u64 {
    100
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            output: default_output(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// `[serve]` section: the live-preview server started by `watch`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServeSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    /// `0` picks an ephemeral port.
    #[serde(default)]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ServeSection {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: 0,
        }
    }
}

/// `[deploy]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploySection {
    #[serde(default)]
    pub kind: PublishKind,

    /// Git remote name or URL.
    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_message")]
    pub message: String,

    /// Target directory for `kind = "directory"`.
    #[serde(default)]
    pub path: Option<String>,
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_branch() -> String {
    "gh-pages".to_string()
}

fn default_message() -> String {
    "Update site".to_string()
}

impl Default for DeploySection {
    fn default() -> Self {
        Self {
            kind: PublishKind::default(),
            remote: default_remote(),
            branch: default_branch(),
            message: default_message(),
            path: None,
        }
    }
}

/// `[lint]` section: style-source rules. A limit of `0` disables a numeric
/// rule.
#[derive(Debug, Clone, Deserialize)]
pub struct LintSection {
    pub input: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,

    #[serde(default = "default_indentation")]
    pub indentation: usize,

    #[serde(default = "default_true")]
    pub no_trailing_whitespace: bool,

    #[serde(default = "default_true")]
    pub no_important: bool,

    #[serde(default = "default_true")]
    pub no_empty_rulesets: bool,

    #[serde(default = "default_true")]
    pub final_newline: bool,
}

fn default_max_line_length() -> usize {
    80
}

fn default_indentation() -> usize {
    2
}

impl LintSection {
    pub fn with_input(input: Vec<String>) -> Self {
        Self {
            input,
            exclude: Vec::new(),
            max_line_length: default_max_line_length(),
            indentation: default_indentation(),
            no_trailing_whitespace: true,
            no_important: true,
            no_empty_rulesets: true,
            final_newline: true,
        }
    }
}

/// `[task.<name>]` section.
///
/// Which fields matter depends on `kind`; validation rejects missing
/// required ones.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub kind: UnitKind,

    /// Input patterns, relative to the project root.
    #[serde(default)]
    pub input: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    /// Directory that input paths are made relative to when placed under
    /// `output`. Defaults to each pattern's leading literal directory.
    #[serde(default)]
    pub base: Option<String>,

    /// Output directory relative to `[config].output`. Defaults to the
    /// output root.
    #[serde(default)]
    pub output: Option<String>,

    /// Artifact name for `kind = "concat"`.
    #[serde(default)]
    pub file: Option<String>,

    /// Dependency list: this task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Watch patterns. `None` watches `input`; `Some([])` disables watching.
    #[serde(default)]
    pub watch: Option<Vec<String>>,

    /// Notify preview viewers after this task writes output.
    #[serde(default = "default_true")]
    pub reload: bool,

    /// Include hidden files.
    #[serde(default)]
    pub dot: bool,

    /// Skip files whose destination already has identical content.
    #[serde(default = "default_true")]
    pub incremental: bool,

    #[serde(default)]
    pub minify: bool,

    #[serde(default)]
    pub source_map: bool,

    #[serde(default)]
    pub style: StyleOutput,

    /// Output extension for rendered templates.
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Implicit context for `kind = "template"`.
    #[serde(default)]
    pub context: toml::Table,

    /// Shell command for `kind = "command"`.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Directory removed by `kind = "clean"`. Defaults to the output root.
    #[serde(default)]
    pub path: Option<String>,
}

fn default_extension() -> String {
    "html".to_string()
}

impl TaskConfig {
    /// A task of the given kind with every optional field at its default.
    pub fn of_kind(kind: UnitKind) -> Self {
        Self {
            kind,
            input: Vec::new(),
            exclude: Vec::new(),
            base: None,
            output: None,
            file: None,
            after: Vec::new(),
            watch: None,
            reload: true,
            dot: false,
            incremental: true,
            minify: false,
            source_map: false,
            style: StyleOutput::default(),
            extension: default_extension(),
            context: toml::Table::new(),
            cmd: None,
            path: None,
        }
    }

    /// Effective watch patterns: explicit `watch`, else `input` for units
    /// that read a file-set.
    pub fn effective_watch(&self) -> Vec<String> {
        match &self.watch {
            Some(list) => list.clone(),
            None if self.kind.reads_file_set() => self.input.clone(),
            None => Vec::new(),
        }
    }

    pub fn output_dir(&self) -> &str {
        self.output.as_deref().unwrap_or(".")
    }
}
