// src/units/copy.rs

use anyhow::Context;
use tracing::debug;

use crate::fileset::{FileSetBinding, MatchedFile};
use crate::fs::FileSystem;
use crate::types::UnitKind;
use crate::units::{
    blocking, display_path, FileError, Transform, UnitContext, UnitFuture, UnitReport,
};

/// Copies a file-set into its output directory, preserving paths relative
/// to the pattern base.
#[derive(Debug, Clone)]
pub struct CopyUnit {
    files: FileSetBinding,
    incremental: bool,
}

impl CopyUnit {
    pub fn new(files: FileSetBinding, incremental: bool) -> Self {
        Self { files, incremental }
    }
}

impl Transform for CopyUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::Copy
    }

    fn run(&self, ctx: UnitContext) -> UnitFuture {
        let unit = self.clone();
        blocking(move || unit.copy_all(&ctx))
    }
}

impl CopyUnit {
    fn copy_all(&self, ctx: &UnitContext) -> anyhow::Result<UnitReport> {
        let out_dir = ctx.output_dir(&self.files);
        let mut report = UnitReport::default();

        for file in ctx.collect(&self.files)? {
            let dest = out_dir.join(&file.relative_to_base);
            match self.copy_one(ctx.fs.as_ref(), &file, &dest) {
                Ok(changed) => report.record_write(dest, changed),
                Err(e) => report.file_errors.push(FileError {
                    path: display_path(ctx, &file.path),
                    message: format!("{e:#}"),
                }),
            }
        }

        debug!(
            task = %ctx.task,
            copied = report.written.len(),
            unchanged = report.skipped,
            "copy finished"
        );
        Ok(report)
    }

    /// Returns `false` when the destination already held the same bytes.
    fn copy_one(
        &self,
        fs: &dyn FileSystem,
        file: &MatchedFile,
        dest: &std::path::Path,
    ) -> anyhow::Result<bool> {
        let bytes = fs.read(&file.path)?;

        if self.incremental && fs.is_file(dest) {
            let existing = fs.read(dest)?;
            if blake3::hash(&existing) == blake3::hash(&bytes) {
                return Ok(false);
            }
        }

        fs.write(dest, &bytes)
            .with_context(|| format!("copying {} to {}", file.rel, dest.display()))?;
        Ok(true)
    }
}
