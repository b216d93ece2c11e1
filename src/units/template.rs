// src/units/template.rs

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use minijinja::Environment;
use tracing::{debug, warn};

use crate::fileset::{glob_base, relative_to, FileSetBinding, MatchedFile};
use crate::fs::{write_if_changed, FileSystem};
use crate::types::UnitKind;
use crate::units::{
    blocking, display_path, with_extension, FileError, Transform, UnitContext, UnitFuture,
    UnitReport,
};

/// Extensions loaded as templates in addition to those of the pages.
const TEMPLATE_EXTENSIONS: &[&str] = &["twig", "html", "htm", "j2", "jinja", "jinja2", "njk"];

/// Renders each page of a file-set with `minijinja`.
///
/// Every template below the base directory is loadable by name (its path
/// relative to the base), so pages can `extends`/`include` layouts and
/// partials that are excluded from the page set. A page that fails to
/// render is reported and skipped; the others are still written.
#[derive(Debug, Clone)]
pub struct TemplateUnit {
    pages: FileSetBinding,
    base: Option<String>,
    context: toml::Table,
    extension: String,
}

impl TemplateUnit {
    pub fn new(
        pages: FileSetBinding,
        base: Option<String>,
        context: toml::Table,
        extension: String,
    ) -> Self {
        Self {
            pages,
            base,
            context,
            extension,
        }
    }

    fn base_dir(&self, root: &Path) -> PathBuf {
        match &self.base {
            Some(base) => root.join(base),
            None => {
                let first = self.pages.include_patterns().next().unwrap_or("");
                root.join(glob_base(first))
            }
        }
    }
}

impl Transform for TemplateUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::Template
    }

    fn run(&self, ctx: UnitContext) -> UnitFuture {
        let unit = self.clone();
        blocking(move || unit.render_all(&ctx))
    }
}

impl TemplateUnit {
    fn render_all(&self, ctx: &UnitContext) -> anyhow::Result<UnitReport> {
        let pages = ctx.collect(&self.pages)?;
        let base_dir = self.base_dir(&ctx.root);
        let mut report = UnitReport::default();

        let mut extensions: BTreeSet<String> =
            TEMPLATE_EXTENSIONS.iter().map(|e| e.to_string()).collect();
        extensions.extend(pages.iter().filter_map(|p| extension_of(&p.path)));

        let sources = load_sources(ctx.fs.as_ref(), &base_dir, &ctx.output_root, &extensions)?;

        let mut env = Environment::new();
        let mut broken: BTreeSet<&str> = BTreeSet::new();
        for (name, (path, source)) in &sources {
            if let Err(e) = env.add_template(name, source) {
                warn!(task = %ctx.task, template = %name, "template does not parse");
                broken.insert(name.as_str());
                report.file_errors.push(FileError {
                    path: display_path(ctx, path),
                    message: e.to_string(),
                });
            }
        }

        let out_dir = ctx.output_dir(&self.pages);
        for page in &pages {
            let Some(name) = relative_to(&base_dir, &page.path) else {
                report.file_errors.push(FileError {
                    path: display_path(ctx, &page.path),
                    message: format!("page is outside the template base {}", base_dir.display()),
                });
                continue;
            };
            if broken.contains(name.as_str()) {
                continue;
            }

            match self.render_page(&env, &name, page) {
                Ok(html) => {
                    let dest = out_dir.join(with_extension(&page.relative_to_base, &self.extension));
                    let changed = write_if_changed(ctx.fs.as_ref(), &dest, html.as_bytes())?;
                    report.record_write(dest, changed);
                }
                Err(message) => report.file_errors.push(FileError {
                    path: display_path(ctx, &page.path),
                    message,
                }),
            }
        }

        debug!(
            task = %ctx.task,
            pages = pages.len(),
            failed = report.file_errors.len(),
            "templates rendered"
        );
        Ok(report)
    }

    fn render_page(
        &self,
        env: &Environment<'_>,
        name: &str,
        page: &MatchedFile,
    ) -> Result<String, String> {
        let mut context =
            serde_json::to_value(&self.context).map_err(|e| format!("invalid context: {e}"))?;
        if let serde_json::Value::Object(map) = &mut context {
            let page_name = page
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            map.insert(
                "page".to_string(),
                serde_json::json!({ "path": page.rel, "name": page_name }),
            );
        }

        let template = env.get_template(name).map_err(|e| e.to_string())?;
        template.render(&context).map_err(|e| e.to_string())
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().into_owned())
}

/// Template sources below `base_dir`, keyed by `/`-separated name.
fn load_sources(
    fs: &dyn FileSystem,
    base_dir: &Path,
    skip: &Path,
    extensions: &BTreeSet<String>,
) -> anyhow::Result<BTreeMap<String, (PathBuf, String)>> {
    let mut sources = BTreeMap::new();
    if !fs.is_dir(base_dir) {
        return Ok(sources);
    }

    let mut stack = vec![base_dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if path == skip {
                continue;
            }
            if fs.is_dir(&path) {
                stack.push(path);
                continue;
            }
            let wanted = extension_of(&path).is_some_and(|e| extensions.contains(&e));
            let Some(name) = relative_to(base_dir, &path) else {
                continue;
            };
            if !wanted || name.split('/').any(|c| c.starts_with('.')) {
                continue;
            }
            let source = fs.read_to_string(&path)?;
            sources.insert(name, (path, source));
        }
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use std::sync::Arc;

    fn ctx(fs: &MockFileSystem) -> UnitContext {
        UnitContext {
            root: PathBuf::from("/site"),
            output_root: PathBuf::from("/site/dist"),
            fs: Arc::new(fs.clone()),
            task: "html".into(),
        }
    }

    fn unit() -> TemplateUnit {
        let pages = FileSetBinding::new(
            &[
                "src/templates/**/*.twig".to_string(),
                "!src/templates/layouts/**".to_string(),
            ],
            &[],
            None,
            ".",
            false,
        )
        .unwrap();
        let mut context = toml::Table::new();
        context.insert("site".into(), toml::Value::String("Example".into()));
        TemplateUnit::new(pages, None, context, "html".into())
    }

    #[tokio::test]
    async fn renders_pages_with_layouts_and_context() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/site/src/templates/layouts/base.twig",
            "<title>{{ site }}</title>{% block body %}{% endblock %}",
        );
        fs.add_file(
            "/site/src/templates/index.twig",
            "{% extends \"layouts/base.twig\" %}{% block body %}{{ page.name }}{% endblock %}",
        );

        let report = unit().run(ctx(&fs)).await.unwrap();
        assert!(report.file_errors.is_empty());
        assert_eq!(report.written, vec![PathBuf::from("/site/dist/index.html")]);
        let html = fs.read_to_string(Path::new("/site/dist/index.html")).unwrap();
        assert_eq!(html, "<title>Example</title>index");
        assert!(!fs.exists(Path::new("/site/dist/layouts/base.html")));
    }

    #[tokio::test]
    async fn one_broken_page_does_not_stop_the_others() {
        let fs = MockFileSystem::new();
        fs.add_file("/site/src/templates/a.twig", "A");
        fs.add_file("/site/src/templates/b.twig", "{% if %}");
        fs.add_file("/site/src/templates/c.twig", "{{ missing_filter | nope }}");
        fs.add_file("/site/src/templates/d.twig", "D");

        let report = unit().run(ctx(&fs)).await.unwrap();
        assert_eq!(report.file_errors.len(), 2);
        assert!(fs.exists(Path::new("/site/dist/a.html")));
        assert!(fs.exists(Path::new("/site/dist/d.html")));
        assert!(!fs.exists(Path::new("/site/dist/b.html")));
        assert!(!fs.exists(Path::new("/site/dist/c.html")));
    }
}
