// src/units/concat.rs

use anyhow::Context;
use tracing::{debug, warn};

use crate::fileset::FileSetBinding;
use crate::fs::write_if_changed;
use crate::types::UnitKind;
use crate::units::sourcemap::{LineMappings, SourceMap};
use crate::units::{blocking, Transform, UnitContext, UnitFuture, UnitReport};

/// Concatenates a file-set, in pattern order, into one artifact.
#[derive(Debug, Clone)]
pub struct ConcatUnit {
    files: FileSetBinding,
    file: String,
    minify: bool,
    source_map: bool,
}

impl ConcatUnit {
    pub fn new(files: FileSetBinding, file: String, minify: bool, source_map: bool) -> Self {
        Self {
            files,
            file,
            minify,
            source_map,
        }
    }
}

impl Transform for ConcatUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::Concat
    }

    fn run(&self, ctx: UnitContext) -> UnitFuture {
        let unit = self.clone();
        blocking(move || unit.concat(&ctx))
    }
}

impl ConcatUnit {
    fn concat(&self, ctx: &UnitContext) -> anyhow::Result<UnitReport> {
        let mut report = UnitReport::default();
        let inputs = ctx.collect(&self.files)?;
        if inputs.is_empty() {
            warn!(task = %ctx.task, "no input files matched; nothing to concatenate");
            return Ok(report);
        }

        let sources: Vec<(String, String)> = inputs
            .iter()
            .map(|m| {
                ctx.fs
                    .read_to_string(&m.path)
                    .map(|content| (m.rel.clone(), content))
                    .with_context(|| format!("reading {}", m.rel))
            })
            .collect::<anyhow::Result<_>>()?;

        let mut out_lines: Vec<&str> = Vec::new();
        let mut mappings = LineMappings::new();
        let mut map = SourceMap::new(self.file.clone());

        for (rel, content) in &sources {
            let index = map.add_source(rel.clone(), content.clone());
            for (line_no, line) in content.lines().enumerate() {
                let line = if self.minify {
                    match minify_line(line) {
                        Some(l) => l,
                        None => continue,
                    }
                } else {
                    line
                };
                out_lines.push(line);
                mappings.map_line(index, line_no);
            }
        }

        let mut output = out_lines.join("\n");
        output.push('\n');

        let out_dir = ctx.output_dir(&self.files);
        let out_path = out_dir.join(&self.file);
        let changed = write_if_changed(ctx.fs.as_ref(), &out_path, output.as_bytes())?;
        report.record_write(out_path, changed);

        if self.source_map {
            map.mappings = mappings.finish();
            let map_path = out_dir.join(format!("{}.map", self.file));
            let changed = write_if_changed(ctx.fs.as_ref(), &map_path, map.to_json()?.as_bytes())?;
            report.record_write(map_path, changed);
        }

        debug!(
            task = %ctx.task,
            inputs = sources.len(),
            lines = out_lines.len(),
            "concatenated"
        );
        Ok(report)
    }
}

/// Line-level minification: trims whitespace and drops blank lines and
/// full-line `//` comments.
fn minify_line(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with("//") {
        None
    } else {
        Some(trimmed)
    }
}
