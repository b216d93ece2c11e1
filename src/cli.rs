// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `sitedag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sitedag",
    version,
    about = "Build, watch, lint and deploy a static site from a graph of tasks.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML). Its directory is the project root.
    #[arg(long, global = true, value_name = "PATH", default_value = "Sitedag.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SITEDAG_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the resolved plan, but don't run anything.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl CliArgs {
    /// The requested command; none means `default`.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Default)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the `build` pipeline once.
    Build,
    /// Watch sources, rebuild on change and serve a live-reloading preview.
    Watch,
    /// `build`, then `watch` (even when the build failed).
    Default,
    /// Publish the current output tree.
    Deploy,
    /// Check style sources against the `[lint]` rules.
    Lint,
    /// Run a named pipeline or a single task (with its `after` dependencies).
    Run {
        #[arg(value_name = "NAME")]
        name: String,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_default() {
        let args = CliArgs::try_parse_from(["sitedag"]).unwrap();
        assert_eq!(args.command(), Command::Default);
        assert_eq!(args.config, "Sitedag.toml");
    }

    #[test]
    fn global_flags_after_subcommand() {
        let args =
            CliArgs::try_parse_from(["sitedag", "run", "css", "--dry-run", "--log-level", "debug"])
                .unwrap();
        assert_eq!(args.command(), Command::Run { name: "css".into() });
        assert!(args.dry_run);
        assert_eq!(args.log_level, Some(LogLevel::Debug));
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(CliArgs::try_parse_from(["sitedag", "publish"]).is_err());
    }
}
