// src/units/mod.rs

//! Transformation units.
//!
//! Every task kind implements [`Transform`]: given a [`UnitContext`], it
//! reads its file-set and writes its outputs, reporting what it wrote and
//! which individual files failed. Returning `Err` fails the whole task.
//!
//! Compilation and rendering are synchronous library calls, so most units
//! run their body on the blocking pool via [`blocking`].

use std::fmt::Debug;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Context;

use crate::config::model::TaskConfig;
use crate::engine::TaskName;
use crate::fileset::{FileSetBinding, MatchedFile};
use crate::fs::FileSystem;
use crate::types::UnitKind;

pub mod clean;
pub mod command;
pub mod concat;
pub mod copy;
pub mod sourcemap;
pub mod style;
pub mod template;

pub use clean::CleanUnit;
pub use command::CommandUnit;
pub use concat::ConcatUnit;
pub use copy::CopyUnit;
pub use style::StyleUnit;
pub use template::TemplateUnit;

/// Everything a unit invocation needs from the outside world.
#[derive(Debug, Clone)]
pub struct UnitContext {
    /// Project root; input patterns are relative to it.
    pub root: PathBuf,
    /// Absolute output root.
    pub output_root: PathBuf,
    pub fs: Arc<dyn FileSystem>,
    pub task: TaskName,
}

impl UnitContext {
    /// Files of `binding`, never descending into the output root.
    pub fn collect(&self, binding: &FileSetBinding) -> anyhow::Result<Vec<MatchedFile>> {
        binding.collect(self.fs.as_ref(), &self.root, Some(&self.output_root))
    }

    /// Absolute output directory of `binding`.
    pub fn output_dir(&self, binding: &FileSetBinding) -> PathBuf {
        let dir = binding.output_dir();
        if dir.as_os_str().is_empty() || dir == Path::new(".") {
            self.output_root.clone()
        } else {
            self.output_root.join(dir)
        }
    }
}

/// One input file that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileError {
    pub path: PathBuf,
    pub message: String,
}

/// What a unit invocation did.
#[derive(Debug, Clone, Default)]
pub struct UnitReport {
    /// Files written (or rewritten) in this invocation.
    pub written: Vec<PathBuf>,
    /// Files left untouched because their output was already up to date.
    pub skipped: usize,
    pub file_errors: Vec<FileError>,
}

impl UnitReport {
    pub fn record_write(&mut self, path: PathBuf, changed: bool) {
        if changed {
            self.written.push(path);
        } else {
            self.skipped += 1;
        }
    }
}

pub type UnitFuture = Pin<Box<dyn Future<Output = anyhow::Result<UnitReport>> + Send + 'static>>;

/// A unit of work bound to one task.
pub trait Transform: Send + Sync + Debug {
    fn kind(&self) -> UnitKind;

    fn run(&self, ctx: UnitContext) -> UnitFuture;
}

/// Run `f` on the blocking pool.
pub fn blocking<F>(f: F) -> UnitFuture
where
    F: FnOnce() -> anyhow::Result<UnitReport> + Send + 'static,
{
    Box::pin(async move {
        tokio::task::spawn_blocking(f)
            .await
            .context("unit worker panicked")?
    })
}

/// Instantiate the unit described by a validated task config.
pub fn build_unit(name: &str, cfg: &TaskConfig) -> anyhow::Result<Arc<dyn Transform>> {
    let unit: Arc<dyn Transform> = match cfg.kind {
        UnitKind::Clean => Arc::new(CleanUnit::new(cfg.path.clone())),
        UnitKind::Style => Arc::new(StyleUnit::new(file_set(name, cfg)?, cfg.style, cfg.source_map)),
        UnitKind::Concat => Arc::new(ConcatUnit::new(
            file_set(name, cfg)?,
            cfg.file.clone().unwrap_or_default(),
            cfg.minify,
            cfg.source_map,
        )),
        UnitKind::Copy => Arc::new(CopyUnit::new(file_set(name, cfg)?, cfg.incremental)),
        UnitKind::Template => Arc::new(TemplateUnit::new(
            file_set(name, cfg)?,
            cfg.base.clone(),
            cfg.context.clone(),
            cfg.extension.clone(),
        )),
        UnitKind::Command => Arc::new(CommandUnit::new(
            cfg.cmd.clone().unwrap_or_default(),
            cfg.output_dir().to_string(),
        )),
    };
    Ok(unit)
}

fn file_set(name: &str, cfg: &TaskConfig) -> anyhow::Result<FileSetBinding> {
    FileSetBinding::new(
        &cfg.input,
        &cfg.exclude,
        cfg.base.as_deref(),
        cfg.output_dir(),
        cfg.dot,
    )
    .with_context(|| format!("task '{name}'"))
}

/// `path` with its extension replaced by `ext`.
pub(crate) fn with_extension(path: &Path, ext: &str) -> PathBuf {
    let mut out = path.to_path_buf();
    out.set_extension(ext);
    out
}

/// Project-relative display form used in file errors.
pub(crate) fn display_path(ctx: &UnitContext, path: &Path) -> PathBuf {
    path.strip_prefix(&ctx.root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}
