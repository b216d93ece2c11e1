// src/logging.rs

//! Logging setup for `sitedag` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `SITEDAG_LOG` environment variable (an `EnvFilter` directive such as
//!    "debug" or "sitedag::watch=trace,info")
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that stdout carries only command output
//! (lint violations, `--dry-run` plans).

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "SITEDAG_LOG";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = filter_for(cli_level, std::env::var(LOG_ENV).ok().as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing log subscriber: {e}"))
}

fn filter_for(cli_level: Option<LogLevel>, env: Option<&str>) -> EnvFilter {
    if let Some(level) = cli_level {
        return EnvFilter::new(level.as_str());
    }
    env.and_then(|directive| EnvFilter::try_new(directive.trim()).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}
