// src/units/command.rs

use std::process::Stdio;

use anyhow::{bail, Context};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::types::UnitKind;
use crate::units::{Transform, UnitContext, UnitFuture, UnitReport};

/// Environment variable holding the task's absolute output directory.
pub const OUTPUT_ENV: &str = "SITEDAG_OUTPUT";

/// Delegates to an external shell command run in the project root.
#[derive(Debug, Clone)]
pub struct CommandUnit {
    cmd: String,
    output: String,
}

impl CommandUnit {
    pub fn new(cmd: String, output: String) -> Self {
        Self { cmd, output }
    }
}

impl Transform for CommandUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::Command
    }

    fn run(&self, ctx: UnitContext) -> UnitFuture {
        let unit = self.clone();
        Box::pin(async move { unit.run_command(&ctx).await })
    }
}

impl CommandUnit {
    async fn run_command(&self, ctx: &UnitContext) -> anyhow::Result<UnitReport> {
        let output_dir = if self.output == "." {
            ctx.output_root.clone()
        } else {
            ctx.output_root.join(&self.output)
        };

        info!(task = %ctx.task, cmd = %self.cmd, "starting command");

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        cmd.current_dir(&ctx.root)
            .env(OUTPUT_ENV, &output_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning command for task '{}'", ctx.task))?;

        if let Some(stdout) = child.stdout.take() {
            let task = ctx.task.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    info!(task = %task, "{line}");
                }
            });
        }

        // Always consume stderr so buffers don't fill.
        if let Some(stderr) = child.stderr.take() {
            let task = ctx.task.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(task = %task, "{line}");
                }
            });
        }

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for command of task '{}'", ctx.task))?;

        debug!(task = %ctx.task, code = ?status.code(), "command exited");
        if !status.success() {
            match status.code() {
                Some(code) => bail!("command exited with status {code}"),
                None => bail!("command terminated by signal"),
            }
        }

        Ok(UnitReport::default())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::fs::RealFileSystem;
    use std::sync::Arc;

    fn ctx(dir: &std::path::Path) -> UnitContext {
        UnitContext {
            root: dir.to_path_buf(),
            output_root: dir.join("dist"),
            fs: Arc::new(RealFileSystem),
            task: "cmd".into(),
        }
    }

    #[tokio::test]
    async fn exposes_output_dir_and_reports_failure() {
        let dir = tempfile::tempdir().unwrap();

        let ok = CommandUnit::new(
            "mkdir -p \"$SITEDAG_OUTPUT\" && echo hi > \"$SITEDAG_OUTPUT/out.txt\"".into(),
            "misc".into(),
        );
        ok.run(ctx(dir.path())).await.unwrap();
        assert!(dir.path().join("dist/misc/out.txt").is_file());

        let failing = CommandUnit::new("exit 3".into(), ".".into());
        let err = failing.run(ctx(dir.path())).await.unwrap_err();
        assert!(err.to_string().contains("status 3"));
    }
}
