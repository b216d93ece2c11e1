// src/lib.rs

pub mod cli;
pub mod commands;
pub mod config;
pub mod dag;
pub mod deploy;
pub mod engine;
pub mod errors;
pub mod events;
pub mod exec;
pub mod fileset;
pub mod fs;
pub mod lint;
pub mod logging;
pub mod serve;
pub mod types;
pub mod units;
pub mod watch;

use std::path::PathBuf;

use anyhow::Result;
use tracing::debug;

use crate::cli::{CliArgs, Command};
use crate::commands::{print_plan, Project};

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the project, then dispatches the command. Returns
/// the process exit code; configuration errors come back as `Err` before
/// any task runs.
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let project = Project::load(&config_path)?;
    let command = args.command();

    if args.dry_run {
        dry_run(&project, &command)?;
        return Ok(0);
    }

    let code = match command {
        Command::Build => commands::build(&project, "build").await?,
        Command::Run { name } => commands::build(&project, &name).await?,
        Command::Watch => commands::watch(&project).await?,
        Command::Default => commands::build_then_watch(&project).await?,
        Command::Deploy => commands::deploy(&project).await?,
        Command::Lint => commands::lint(&project)?,
    };
    Ok(code)
}

/// Print what `command` would do, without running anything.
fn dry_run(project: &Project, command: &Command) -> Result<()> {
    println!("sitedag dry-run");
    println!("  root = {}", project.root.display());
    println!("  output = {}", project.output_root.display());
    println!("  tasks = {}", project.registry.len());
    println!();

    match command {
        Command::Build | Command::Default => print_plan(&project.plan("build")?),
        Command::Run { name } => print_plan(&project.plan(name)?),
        Command::Watch => print_plan(&project.watch_plan()?),
        Command::Deploy => {
            let section = project.cfg.deploy_section().cloned().unwrap_or_default();
            let target = match section.path {
                Some(path) => path,
                None => format!("{}#{}", section.remote, section.branch),
            };
            println!("deploy: {:?} -> {target}", section.kind);
        }
        Command::Lint => {
            let section = commands::lint_section(&project.cfg)?;
            println!("lint: {:?}", section.input);
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
