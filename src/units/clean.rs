// src/units/clean.rs

use anyhow::bail;
use tracing::info;

use crate::types::UnitKind;
use crate::units::{blocking, Transform, UnitContext, UnitFuture, UnitReport};

/// Removes the output tree, or `path` relative to the project root.
#[derive(Debug, Clone)]
pub struct CleanUnit {
    path: Option<String>,
}

impl CleanUnit {
    pub fn new(path: Option<String>) -> Self {
        Self { path }
    }
}

impl Transform for CleanUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::Clean
    }

    fn run(&self, ctx: UnitContext) -> UnitFuture {
        let target = match &self.path {
            Some(path) => ctx.root.join(path),
            None => ctx.output_root.clone(),
        };

        blocking(move || {
            if target == ctx.root || !target.starts_with(&ctx.root) {
                bail!(
                    "refusing to remove {} (not below the project root)",
                    target.display()
                );
            }
            if ctx.fs.exists(&target) {
                info!(task = %ctx.task, path = %target.display(), "removing output tree");
            }
            ctx.fs.remove_dir_all(&target)?;
            Ok(UnitReport::default())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::fs::FileSystem;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    fn ctx(fs: &MockFileSystem) -> UnitContext {
        UnitContext {
            root: PathBuf::from("/site"),
            output_root: PathBuf::from("/site/dist"),
            fs: Arc::new(fs.clone()),
            task: "clean".into(),
        }
    }

    #[tokio::test]
    async fn clean_is_idempotent() {
        let fs = MockFileSystem::new();
        fs.add_file("/site/dist/css/main.css", "a{}");
        fs.add_file("/site/src/main.scss", "a{}");

        let unit = CleanUnit::new(None);
        unit.run(ctx(&fs)).await.unwrap();
        assert!(!fs.exists(Path::new("/site/dist")));
        assert!(fs.exists(Path::new("/site/src/main.scss")));

        unit.run(ctx(&fs)).await.unwrap();
        assert!(!fs.exists(Path::new("/site/dist")));
    }

    #[tokio::test]
    async fn refuses_project_root() {
        let fs = MockFileSystem::new();
        fs.add_file("/site/src/main.scss", "a{}");
        let unit = CleanUnit::new(Some(".".into()));
        assert!(unit.run(ctx(&fs)).await.is_err());
        assert!(fs.exists(Path::new("/site/src/main.scss")));
    }
}
