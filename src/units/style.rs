// src/units/style.rs

use std::io;
use std::path::Path;

use anyhow::bail;
use tracing::debug;

use crate::fileset::{FileSetBinding, MatchedFile};
use crate::fs::{write_if_changed, FileSystem};
use crate::types::{StyleOutput, UnitKind};
use crate::units::sourcemap::SourceMap;
use crate::units::{blocking, with_extension, Transform, UnitContext, UnitFuture, UnitReport};

/// Compiles Sass/SCSS entry points with `grass`.
///
/// Files whose name starts with `_` are partials: importable, never
/// compiled on their own. All entries are compiled before anything is
/// written, so a syntax error leaves the previous output untouched.
#[derive(Debug, Clone)]
pub struct StyleUnit {
    files: FileSetBinding,
    style: StyleOutput,
    source_map: bool,
}

impl StyleUnit {
    pub fn new(files: FileSetBinding, style: StyleOutput, source_map: bool) -> Self {
        Self {
            files,
            style,
            source_map,
        }
    }
}

impl Transform for StyleUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::Style
    }

    fn run(&self, ctx: UnitContext) -> UnitFuture {
        let unit = self.clone();
        blocking(move || unit.compile_all(&ctx))
    }
}

struct Compiled {
    entry: MatchedFile,
    css: String,
}

impl StyleUnit {
    fn compile_all(&self, ctx: &UnitContext) -> anyhow::Result<UnitReport> {
        let entries: Vec<MatchedFile> = ctx
            .collect(&self.files)?
            .into_iter()
            .filter(|m| !is_partial(&m.path))
            .collect();

        let mut compiled = Vec::with_capacity(entries.len());
        let mut errors = Vec::new();
        for entry in entries {
            match compile(ctx.fs.as_ref(), &entry.path, self.style) {
                Ok(css) => compiled.push(Compiled { entry, css }),
                Err(message) => errors.push(format!("{}: {message}", entry.rel)),
            }
        }

        if !errors.is_empty() {
            bail!("{}", errors.join("\n"));
        }

        let out_dir = ctx.output_dir(&self.files);
        let mut report = UnitReport::default();

        for Compiled { entry, css } in compiled {
            let css_path = out_dir.join(with_extension(&entry.relative_to_base, "css"));

            if self.source_map {
                let css_name = file_name(&css_path);
                let map_name = format!("{css_name}.map");
                let mut map = SourceMap::new(css_name);
                map.add_source(entry.rel.clone(), ctx.fs.read_to_string(&entry.path)?);

                let map_path = css_path.with_file_name(&map_name);
                let changed =
                    write_if_changed(ctx.fs.as_ref(), &map_path, map.to_json()?.as_bytes())?;
                report.record_write(map_path, changed);
            }

            let changed = write_if_changed(ctx.fs.as_ref(), &css_path, css.as_bytes())?;
            debug!(task = %ctx.task, entry = %entry.rel, changed, "compiled style sheet");
            report.record_write(css_path, changed);
        }

        Ok(report)
    }
}

fn compile(fs: &dyn FileSystem, path: &Path, style: StyleOutput) -> Result<String, String> {
    let adapter = GrassFs(fs);
    let output_style = match style {
        StyleOutput::Compressed => grass::OutputStyle::Compressed,
        StyleOutput::Expanded => grass::OutputStyle::Expanded,
    };
    let mut options = grass::Options::default().fs(&adapter).style(output_style);
    if let Some(parent) = path.parent() {
        options = options.load_path(parent);
    }

    grass::from_path(path, &options).map_err(|e| e.to_string())
}

fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Routes `grass` imports through our [`FileSystem`].
#[derive(Debug)]
struct GrassFs<'a>(&'a dyn FileSystem);

impl grass::Fs for GrassFs<'_> {
    fn is_dir(&self, path: &Path) -> bool {
        self.0.is_dir(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.0.is_file(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.0
            .read(path)
            .map_err(|e| io::Error::new(io::ErrorKind::NotFound, format!("{e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn ctx(fs: &MockFileSystem) -> UnitContext {
        UnitContext {
            root: PathBuf::from("/site"),
            output_root: PathBuf::from("/site/dist"),
            fs: Arc::new(fs.clone()),
            task: "css".into(),
        }
    }

    fn unit(source_map: bool) -> StyleUnit {
        let files =
            FileSetBinding::new(&["src/sass/**/*.scss".to_string()], &[], None, "css", false)
                .unwrap();
        StyleUnit::new(files, StyleOutput::Compressed, source_map)
    }

    #[tokio::test]
    async fn compiles_entries_and_skips_partials() {
        let fs = MockFileSystem::new();
        fs.add_file("/site/src/sass/_vars.scss", "$c: red;");
        fs.add_file(
            "/site/src/sass/main.scss",
            "@import 'vars';\nbody { color: $c; }\n",
        );

        let report = unit(true).run(ctx(&fs)).await.unwrap();
        assert_eq!(report.written.len(), 2);

        let css = fs.read_to_string(Path::new("/site/dist/css/main.css")).unwrap();
        assert!(css.starts_with("body{color:red}"));
        assert!(!css.contains("sourceMappingURL"));
        assert!(fs.is_file(Path::new("/site/dist/css/main.css.map")));
        assert!(!fs.exists(Path::new("/site/dist/css/_vars.css")));
    }

    #[tokio::test]
    async fn syntax_error_writes_nothing() {
        let fs = MockFileSystem::new();
        fs.add_file("/site/src/sass/ok.scss", "a { color: blue; }");
        fs.add_file("/site/src/sass/main.scss", "body { color: ");

        let err = unit(true).run(ctx(&fs)).await.unwrap_err();
        assert!(format!("{err:#}").contains("src/sass/main.scss"));
        assert!(!fs.exists(Path::new("/site/dist/css/ok.css")));
        assert!(!fs.exists(Path::new("/site/dist/css/main.css")));
    }
}
