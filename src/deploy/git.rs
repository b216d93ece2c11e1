// src/deploy/git.rs

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::deploy::{collect_tree, copy_tree, PublishFuture, PublishReport, Publisher};
use crate::errors::{Result, SitedagError};

/// Commits the output tree into a fresh temporary repository and
/// force-pushes it to `branch` of `remote`.
///
/// `remote` is either a remote name of the project repository (resolved
/// with `git remote get-url`) or anything `git push` accepts as a URL.
#[derive(Debug, Clone)]
pub struct GitPublisher {
    project_root: PathBuf,
    remote: String,
    branch: String,
    message: String,
}

impl GitPublisher {
    pub fn new(project_root: PathBuf, remote: String, branch: String, message: String) -> Self {
        Self {
            project_root,
            remote,
            branch,
            message,
        }
    }

    async fn remote_url(&self) -> Result<String> {
        if looks_like_url(&self.remote) {
            // The push runs in the staging repository, so local paths must
            // not stay relative to the project.
            let local = self.project_root.join(&self.remote);
            if !self.remote.contains("://") && local.exists() {
                return Ok(local.display().to_string());
            }
            return Ok(self.remote.clone());
        }
        let url = git(&self.project_root, &["remote", "get-url", &self.remote]).await?;
        Ok(url.trim().to_string())
    }

    async fn push_tree(&self, output_root: &Path) -> Result<PublishReport> {
        let files = collect_tree(output_root)?;
        let url = self.remote_url().await?;

        let staging = tempfile::tempdir()
            .map_err(|e| SitedagError::Publish(format!("creating staging directory: {e}")))?;
        let dir = staging.path();
        debug!(staging = %dir.display(), "staging deploy tree");

        git(dir, &["init", "--quiet"]).await?;
        copy_tree(output_root, dir, &files)?;
        git(dir, &["add", "--all"]).await?;
        git(
            dir,
            &[
                "-c",
                "user.name=sitedag",
                "-c",
                "user.email=sitedag@localhost",
                "commit",
                "--quiet",
                "-m",
                &self.message,
            ],
        )
        .await?;

        let refspec = format!("HEAD:refs/heads/{}", self.branch);
        info!(remote = %self.remote, branch = %self.branch, "pushing output tree");
        git(dir, &["push", "--force", "--quiet", &url, &refspec]).await?;

        Ok(PublishReport {
            files: files.len(),
            target: format!("{}#{}", self.remote, self.branch),
        })
    }
}

impl Publisher for GitPublisher {
    fn publish<'a>(&'a self, output_root: &'a Path) -> PublishFuture<'a> {
        Box::pin(self.push_tree(output_root))
    }
}

fn looks_like_url(remote: &str) -> bool {
    remote.contains("://") || remote.contains(':') || remote.contains('/') || remote.contains('\\')
}

/// Run `git args...` in `dir`; non-zero exit is a publish error carrying
/// git's stderr.
async fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| SitedagError::Publish(format!("running git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let subcommand = args.iter().find(|a| !a.starts_with('-') && !a.contains('=')).unwrap_or(&"");
        return Err(SitedagError::Publish(format!(
            "git {subcommand} failed: {}",
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_names_and_urls_are_told_apart() {
        assert!(!looks_like_url("origin"));
        assert!(looks_like_url("git@github.com:me/site.git"));
        assert!(looks_like_url("https://example.com/site.git"));
        assert!(looks_like_url("/tmp/site.git"));
    }
}
