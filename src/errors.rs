// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SitedagError {
    /// Unknown task/stage reference, malformed pattern, bad value.
    /// Always raised before any task runs.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in task graph: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// A unit failed to compile/render its file-set.
    #[error("Transformation error in task '{task}': {message}")]
    Transformation { task: String, message: String },

    /// The deploy target was unreachable or rejected the tree.
    #[error("Publish error: {0}")]
    Publish(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SitedagError {
    /// Errors that must abort a command before or during its first stage.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SitedagError::ConfigError(_)
                | SitedagError::TaskNotFound(_)
                | SitedagError::DagCycle(_)
                | SitedagError::TomlError(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SitedagError>;
