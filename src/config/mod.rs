// src/config/mod.rs

//! Configuration loading and validation for `Sitedag.toml`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, project_root_for};
pub use model::{
    ConfigFile, ConfigSection, DeploySection, LintSection, RawConfigFile, ServeSection,
    StageSpec, TaskConfig,
};
