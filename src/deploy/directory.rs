// src/deploy/directory.rs

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::deploy::{collect_tree, copy_tree, PublishFuture, PublishReport, Publisher};
use crate::errors::SitedagError;

/// Mirrors the output tree into a local directory. Files in the target that
/// are not part of the tree are removed.
#[derive(Debug, Clone)]
pub struct DirectoryPublisher {
    target: PathBuf,
}

impl DirectoryPublisher {
    pub fn new(target: PathBuf) -> Self {
        Self { target }
    }
}

impl Publisher for DirectoryPublisher {
    fn publish<'a>(&'a self, output_root: &'a Path) -> PublishFuture<'a> {
        let from = output_root.to_path_buf();
        let to = self.target.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || mirror(&from, &to))
                .await
                .map_err(|e| SitedagError::Publish(format!("publish worker failed: {e}")))?
        })
    }
}

fn mirror(from: &Path, to: &Path) -> crate::errors::Result<PublishReport> {
    if to.starts_with(from) || from.starts_with(to) {
        return Err(SitedagError::Publish(format!(
            "deploy target {} overlaps the output directory {}",
            to.display(),
            from.display()
        )));
    }

    let files = collect_tree(from)?;

    if to.exists() {
        debug!(target = %to.display(), "clearing deploy target");
        std::fs::remove_dir_all(to)
            .map_err(|e| SitedagError::Publish(format!("clearing {}: {e}", to.display())))?;
    }
    std::fs::create_dir_all(to)
        .map_err(|e| SitedagError::Publish(format!("creating {}: {e}", to.display())))?;

    copy_tree(from, to, &files)?;

    Ok(PublishReport {
        files: files.len(),
        target: to.display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mirrors_and_prunes_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("dist");
        let target = dir.path().join("public");
        std::fs::create_dir_all(out.join("img")).unwrap();
        std::fs::write(out.join("index.html"), "<p>home</p>").unwrap();
        std::fs::write(out.join("img/logo.svg"), "<svg/>").unwrap();
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("stale.html"), "old").unwrap();

        let report = DirectoryPublisher::new(target.clone())
            .publish(&out)
            .await
            .unwrap();

        assert_eq!(report.files, 2);
        assert_eq!(std::fs::read_to_string(target.join("index.html")).unwrap(), "<p>home</p>");
        assert!(target.join("img/logo.svg").is_file());
        assert!(!target.join("stale.html").exists());
    }

    #[tokio::test]
    async fn target_inside_output_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("dist");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("index.html"), "x").unwrap();

        let err = DirectoryPublisher::new(out.join("copy"))
            .publish(&out)
            .await
            .unwrap_err();
        assert!(matches!(err, SitedagError::Publish(_)));
    }
}
