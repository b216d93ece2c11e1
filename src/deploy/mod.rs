// src/deploy/mod.rs

//! Publishing the output tree.
//!
//! `deploy` never builds; it publishes whatever the last build left in the
//! output root through a [`Publisher`]. Every failure here is a
//! `SitedagError::Publish`.

use std::fmt::Debug;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tracing::info;

use crate::config::model::{ConfigFile, DeploySection};
use crate::errors::{Result, SitedagError};
use crate::types::PublishKind;

pub mod directory;
pub mod git;

pub use directory::DirectoryPublisher;
pub use git::GitPublisher;

/// What a successful publish did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub files: usize,
    /// Human-readable destination (`<remote>#<branch>` or a directory).
    pub target: String,
}

pub type PublishFuture<'a> = Pin<Box<dyn Future<Output = Result<PublishReport>> + Send + 'a>>;

/// A destination for the output tree.
pub trait Publisher: Send + Sync + Debug {
    fn publish<'a>(&'a self, output_root: &'a Path) -> PublishFuture<'a>;
}

/// Publisher described by `[deploy]`, with relative paths resolved against
/// the project root.
pub fn publisher_for(section: &DeploySection, root: &Path) -> Box<dyn Publisher> {
    match section.kind {
        PublishKind::Git => Box::new(GitPublisher::new(
            root.to_path_buf(),
            section.remote.clone(),
            section.branch.clone(),
            section.message.clone(),
        )),
        PublishKind::Directory => {
            let target = section.path.as_deref().unwrap_or_default();
            Box::new(DirectoryPublisher::new(root.join(target)))
        }
    }
}

/// Publish `cfg`'s output root as configured in `[deploy]`.
pub async fn deploy(cfg: &ConfigFile, root: &Path) -> Result<PublishReport> {
    let section = cfg.deploy_section().cloned().unwrap_or_default();
    let output_root = root.join(&cfg.config_section().output);

    let publisher = publisher_for(&section, root);
    let report = publisher.publish(&output_root).await?;
    info!(files = report.files, target = %report.target, "deploy finished");
    Ok(report)
}

/// Every file under `output_root`, relative to it and sorted.
///
/// A missing or empty tree is a publish error.
pub fn collect_tree(output_root: &Path) -> Result<Vec<PathBuf>> {
    if !output_root.is_dir() {
        return Err(SitedagError::Publish(format!(
            "output directory {} does not exist; run `sitedag build` first",
            output_root.display()
        )));
    }

    let mut files = Vec::new();
    let mut stack = vec![output_root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| SitedagError::Publish(format!("reading {}: {e}", dir.display())))?;
        for entry in entries {
            let path = entry
                .map_err(|e| SitedagError::Publish(format!("reading {}: {e}", dir.display())))?
                .path();
            if path.is_dir() {
                stack.push(path);
            } else if let Ok(rel) = path.strip_prefix(output_root) {
                files.push(rel.to_path_buf());
            }
        }
    }

    if files.is_empty() {
        return Err(SitedagError::Publish(format!(
            "output directory {} is empty; nothing to deploy",
            output_root.display()
        )));
    }
    files.sort();
    Ok(files)
}

/// Copy `files` (relative to `from`) into `to`.
pub(crate) fn copy_tree(from: &Path, to: &Path, files: &[PathBuf]) -> Result<()> {
    for rel in files {
        let dest = to.join(rel);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SitedagError::Publish(format!("creating {}: {e}", parent.display()))
            })?;
        }
        std::fs::copy(from.join(rel), &dest).map_err(|e| {
            SitedagError::Publish(format!("copying {} to {}: {e}", rel.display(), to.display()))
        })?;
    }
    Ok(())
}
